//! Error types for registry construction and lookup.

use thiserror::Error;

/// Errors from building or invoking the client registry.
///
/// Expected runtime failures (network errors, bad bodies, server-reported
/// errors) never surface here; the executor normalizes those into failure
/// envelopes. These variants cover misconfiguration and misuse only.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two endpoints within one service share a name. The discovery data is
    /// ambiguous and silently picking a winner would hide the conflict.
    #[error("duplicate endpoint '{endpoint}' in service '{service}'")]
    DuplicateEndpoint { service: String, endpoint: String },

    /// A service or endpoint name that the registry does not know.
    #[error("unknown route '{service}.{endpoint}'")]
    UnknownRoute { service: String, endpoint: String },
}

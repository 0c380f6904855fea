//! Inference session orchestration.
//!
//! One session owns the message history for one conversation and drives a
//! single prompt/response exchange at a time: send the generation request,
//! accumulate streamed tokens into the pending assistant message, and
//! expose stop/reload. The session state lives in an explicitly constructed
//! store that is threaded through the controller, never ambient globals.

mod controller;
mod settings;
mod transport;

pub use controller::{
    AppendOutcome, Phase, SessionController, SessionError, SessionSnapshot, SessionStore,
};
pub use settings::GenerationSettings;
pub use transport::{
    decode_token_payload, GenerateOutcome, GenerateTransport, OnStream, OnToken, RegistryTransport,
};

//! HTTP side of the Banter inference transport.
//!
//! This crate turns discovery descriptors into a validated registry of
//! invocable routes, executes single HTTP calls with uniform failure
//! normalization, and reads chunked streaming bodies into decoded frames
//! with cooperative cancellation.

mod config;
mod discovery;
mod error;
mod executor;
mod registry;
mod stream;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use discovery::{fetch_descriptors, DISCOVERY_PATH};
pub use error::RegistryError;
pub use executor::{execute, http_client, CallOutcome, RequestParams};
pub use registry::{ClientRegistry, Route};
pub use stream::{read_stream, CancelToken, Pump, StopReason, StreamEnd, StreamReader};

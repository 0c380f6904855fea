//! Wire-level data model for the Banter inference transport.
//!
//! Everything in this crate is pure data: descriptors returned by the
//! discovery endpoint, the uniform response envelope, the SSE-style frame
//! codec, and chat messages. No I/O happens here; the network side lives in
//! `banter-client`.

mod descriptor;
mod envelope;
mod frame;
mod message;

pub use descriptor::{EndpointDescriptor, HttpMethod, ServiceDescriptor};
pub use envelope::ResponseEnvelope;
pub use frame::{FrameDecoder, StreamFrame};
pub use message::{Message, Role};

//! Transport seam between the session controller and the client registry.
//!
//! The controller only needs one operation: send a generation request and
//! either get tokens streamed back or a complete text. Putting that behind
//! a trait keeps the state machine independently testable and leaves room
//! for non-HTTP providers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use banter_client::{read_stream, CallOutcome, CancelToken, ClientRegistry, RequestParams, StreamEnd};
use banter_protocol::StreamFrame;

/// Token sink invoked synchronously for each decoded piece of text.
pub type OnToken<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Invoked once when the endpoint answers with a raw stream, before any
/// token is decoded.
pub type OnStream<'a> = &'a mut (dyn FnMut() + Send);

/// Outcome of one generation request. Expected failures are data, not
/// errors; the controller turns them into user-visible notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Non-streaming provider returned the full text at once.
    Complete(String),
    /// Tokens were delivered through the sink; this is how the stream ended.
    Streamed(StreamEnd),
    /// The request failed before any content arrived.
    Failed(String),
}

/// One prompt/response exchange against a generation endpoint.
#[async_trait]
pub trait GenerateTransport: Send + Sync {
    async fn generate(
        &self,
        body: Value,
        stop_markers: &[String],
        cancel: CancelToken,
        on_stream: OnStream<'_>,
        on_token: OnToken<'_>,
    ) -> GenerateOutcome;
}

/// Production transport: invokes a generation route from the client
/// registry and, for streaming responses, drives the frame reader.
pub struct RegistryTransport {
    registry: Arc<ClientRegistry>,
    service: String,
    endpoint: String,
}

impl RegistryTransport {
    pub fn new(
        registry: Arc<ClientRegistry>,
        service: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            service: service.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl GenerateTransport for RegistryTransport {
    async fn generate(
        &self,
        body: Value,
        stop_markers: &[String],
        cancel: CancelToken,
        on_stream: OnStream<'_>,
        on_token: OnToken<'_>,
    ) -> GenerateOutcome {
        let params = RequestParams::default().with_body(body);
        let outcome = match self
            .registry
            .invoke(&self.service, &self.endpoint, params)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return GenerateOutcome::Failed(e.to_string()),
        };

        match outcome {
            CallOutcome::Envelope(envelope) => {
                if !envelope.success {
                    return GenerateOutcome::Failed(envelope.message);
                }
                match envelope.data.as_ref().and_then(extract_text) {
                    Some(text) => GenerateOutcome::Complete(text),
                    None => GenerateOutcome::Failed("response carried no text".to_string()),
                }
            }
            CallOutcome::Stream(response) => {
                on_stream();
                let end = read_stream(response, stop_markers.to_vec(), cancel, |frame| {
                    if let StreamFrame::Data(payload) = frame {
                        match decode_token_payload(&payload) {
                            Some(text) => on_token(&text),
                            // A single bad frame must not fail the stream.
                            None => trace!("dropping undecodable data frame: {}", payload),
                        }
                    }
                })
                .await;
                GenerateOutcome::Streamed(end)
            }
        }
    }
}

/// Decode the text carried by one `data` frame payload.
///
/// Payloads are JSON objects of the form `{"data": "..."}`; a bare JSON
/// string is accepted too. Anything else is undecodable and dropped by the
/// caller.
pub fn decode_token_payload(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    extract_text(&value)
}

fn extract_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("data").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

//! Streaming body reader with cooperative cancellation.
//!
//! Chunks are pulled off the response body one at a time and pumped through
//! the line-oriented frame decoder; frames reach the callback synchronously
//! and in wire order. Cancellation is checked before each chunk, so its
//! latency is bounded by one chunk, not sub-chunk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, trace, warn};

use banter_protocol::{FrameDecoder, StreamFrame};

/// Cooperative cancellation token shared between a session and its
/// in-flight stream reader.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next chunk boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Why a stream ended.
///
/// None of these are errors to the caller: the reader always resolves
/// cleanly, and a transport failure mid-stream is reported as data, not
/// raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The body was read to completion.
    Completed,
    /// The cancel token was observed at a chunk boundary.
    Cancelled,
    /// A data frame matched one of the stop markers.
    StopMarker,
    /// The connection dropped mid-stream.
    TransportFailed(String),
}

/// Chunk-by-chunk frame pump, independent of the transport driving it.
///
/// `read_stream` feeds it from an HTTP response; tests feed it raw byte
/// slices directly.
pub struct StreamReader {
    decoder: FrameDecoder,
    stop_markers: Vec<String>,
    cancel: CancelToken,
    // Trailing bytes of an incomplete UTF-8 sequence, completed by the
    // next chunk.
    partial: Vec<u8>,
}

/// Whether to keep pulling chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    Continue,
    Stop(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    StopMarker,
}

impl StreamReader {
    pub fn new(stop_markers: Vec<String>, cancel: CancelToken) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            stop_markers,
            cancel,
            partial: Vec::new(),
        }
    }

    /// Feed one chunk of body bytes, delivering decoded frames in order.
    ///
    /// The cancel token is checked before the chunk is decoded. A data
    /// frame whose literal payload equals a stop marker terminates the
    /// pump without being delivered.
    pub fn feed(&mut self, chunk: &[u8], on_frame: &mut dyn FnMut(StreamFrame)) -> Pump {
        if self.cancel.is_cancelled() {
            return Pump::Stop(StopReason::Cancelled);
        }

        let text = self.decode_complete_utf8(chunk);
        let stop_markers = &self.stop_markers;
        let mut stopped = false;
        self.decoder.feed(&text, |frame| {
            if stopped {
                return;
            }
            if is_stop_marker(stop_markers, &frame) {
                stopped = true;
                return;
            }
            on_frame(frame);
        });

        if stopped {
            Pump::Stop(StopReason::StopMarker)
        } else {
            Pump::Continue
        }
    }

    /// Flush a trailing unterminated line at end of body.
    pub fn finish(&mut self, on_frame: &mut dyn FnMut(StreamFrame)) {
        // A character left incomplete at end of body can never finish;
        // it decodes to a replacement character like any other bad byte.
        if !self.partial.is_empty() {
            let tail = String::from_utf8_lossy(&std::mem::take(&mut self.partial)).into_owned();
            let stop_markers = &self.stop_markers;
            self.decoder.feed(&tail, |frame| {
                if !is_stop_marker(stop_markers, &frame) {
                    on_frame(frame);
                }
            });
        }

        let stop_markers = &self.stop_markers;
        self.decoder.finish(|frame| {
            if !is_stop_marker(stop_markers, &frame) {
                on_frame(frame);
            }
        });
    }

    /// Decode the chunk up to the last complete UTF-8 character, carrying
    /// an incomplete trailing sequence over to the next chunk. Chunk
    /// boundaries are arbitrary and routinely split multi-byte characters.
    fn decode_complete_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.partial);
        bytes.extend_from_slice(chunk);

        let mut text = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        // Genuinely invalid bytes: replace and keep going.
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Incomplete sequence at the end of the chunk.
                        None => {
                            self.partial = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }
}

fn is_stop_marker(markers: &[String], frame: &StreamFrame) -> bool {
    match frame {
        StreamFrame::Data(payload) => markers.iter().any(|m| m == payload),
        _ => false,
    }
}

/// Read a raw streaming response to its end, delivering every decoded
/// frame to `on_frame` in arrival order.
///
/// Resolves cleanly in all cases; see [`StreamEnd`] for the outcome.
pub async fn read_stream(
    response: reqwest::Response,
    stop_markers: Vec<String>,
    cancel: CancelToken,
    mut on_frame: impl FnMut(StreamFrame),
) -> StreamEnd {
    let mut reader = StreamReader::new(stop_markers, cancel);
    let mut body = response.bytes_stream();

    while let Some(next) = body.next().await {
        let chunk = match next {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("stream read failed: {}", e);
                return StreamEnd::TransportFailed(e.to_string());
            }
        };

        trace!("stream chunk: {} bytes", chunk.len());
        match reader.feed(&chunk, &mut on_frame) {
            Pump::Continue => {}
            Pump::Stop(StopReason::Cancelled) => {
                debug!("stream cancelled at chunk boundary");
                return StreamEnd::Cancelled;
            }
            Pump::Stop(StopReason::StopMarker) => {
                debug!("stop marker observed, closing stream");
                return StreamEnd::StopMarker;
            }
        }
    }

    reader.finish(&mut on_frame);
    StreamEnd::Completed
}

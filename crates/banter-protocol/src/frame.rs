//! SSE-style stream frame codec.
//!
//! The inference server streams newline-delimited text with three reserved
//! line prefixes (`event:`, `data:`, and `:` for comments), with a blank
//! line terminating each frame. The decoder here is purely line-oriented
//! and knows nothing about what the payloads mean.

/// One decoded unit from a streaming response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Event marker naming the frame that follows.
    Event(String),
    /// Data payload; for inference streams this is a JSON token chunk.
    Data(String),
    /// Comment line, delivered for observability only.
    Comment(String),
}

impl StreamFrame {
    /// Payload string regardless of frame kind.
    pub fn payload(&self) -> &str {
        match self {
            StreamFrame::Event(s) | StreamFrame::Data(s) | StreamFrame::Comment(s) => s,
        }
    }

    /// Encode this frame in the wire form the decoder accepts.
    pub fn encode(&self) -> String {
        match self {
            StreamFrame::Event(s) => format!("event: {s}\n\n"),
            StreamFrame::Data(s) => format!("data: {s}\n\n"),
            StreamFrame::Comment(s) => format!(": {s}\n\n"),
        }
    }
}

/// Incremental line decoder for a chunked stream body.
///
/// Chunk boundaries are arbitrary, so a partial trailing line is carried
/// over until the next chunk completes it.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of decoded text, invoking `on_frame` for every
    /// complete frame line it contains, in order.
    ///
    /// Malformed lines match no reserved prefix and are dropped; they never
    /// abort the stream and are not delivered.
    pub fn feed(&mut self, chunk: &str, mut on_frame: impl FnMut(StreamFrame)) {
        self.carry.push_str(chunk);

        while let Some(pos) = self.carry.find('\n') {
            let line: String = self.carry.drain(..=pos).collect();
            if let Some(frame) = decode_line(line.trim_end_matches(['\n', '\r'])) {
                on_frame(frame);
            }
        }
    }

    /// Flush any trailing line left without a final newline.
    pub fn finish(&mut self, mut on_frame: impl FnMut(StreamFrame)) {
        if self.carry.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.carry);
        if let Some(frame) = decode_line(line.trim_end_matches('\r')) {
            on_frame(frame);
        }
    }
}

/// Classify one line of the stream body.
///
/// Returns `None` for blank lines (frame terminators) and for lines that
/// match no reserved prefix.
pub fn decode_line(line: &str) -> Option<StreamFrame> {
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix("data:") {
        return Some(StreamFrame::Data(strip_leading_space(rest).to_string()));
    }
    if let Some(rest) = line.strip_prefix("event:") {
        return Some(StreamFrame::Event(strip_leading_space(rest).to_string()));
    }
    if let Some(rest) = line.strip_prefix(':') {
        return Some(StreamFrame::Comment(strip_leading_space(rest).to_string()));
    }
    None
}

// The SSE convention allows exactly one optional space after the colon.
fn strip_leading_space(s: &str) -> &str {
    s.strip_prefix(' ').unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(decoder: &mut FrameDecoder, chunk: &str) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        decoder.feed(chunk, |f| frames.push(f));
        frames
    }

    #[test]
    fn classifies_reserved_prefixes() {
        assert_eq!(
            decode_line("data: {\"data\":\"Hel\"}"),
            Some(StreamFrame::Data("{\"data\":\"Hel\"}".to_string()))
        );
        assert_eq!(
            decode_line("event: completion"),
            Some(StreamFrame::Event("completion".to_string()))
        );
        assert_eq!(
            decode_line(": keepalive"),
            Some(StreamFrame::Comment("keepalive".to_string()))
        );
    }

    #[test]
    fn blank_and_malformed_lines_are_dropped() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("garbage without prefix"), None);
    }

    #[test]
    fn decodes_multiple_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let frames = collect(&mut decoder, "data: {\"data\":\"Hel\"}\n\ndata: {\"data\":\"lo\"}\n\n");
        assert_eq!(
            frames,
            vec![
                StreamFrame::Data("{\"data\":\"Hel\"}".to_string()),
                StreamFrame::Data("{\"data\":\"lo\"}".to_string()),
            ]
        );
    }

    #[test]
    fn carries_partial_lines_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(collect(&mut decoder, "data: par").is_empty());
        let frames = collect(&mut decoder, "tial\n");
        assert_eq!(frames, vec![StreamFrame::Data("partial".to_string())]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        assert!(collect(&mut decoder, "data: tail").is_empty());

        let mut frames = Vec::new();
        decoder.finish(|f| frames.push(f));
        assert_eq!(frames, vec![StreamFrame::Data("tail".to_string())]);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut decoder = FrameDecoder::new();
        let frames = collect(&mut decoder, "data: hi\r\n\r\n");
        assert_eq!(frames, vec![StreamFrame::Data("hi".to_string())]);
    }

    #[test]
    fn round_trips_arbitrary_payloads() {
        let originals = vec![
            StreamFrame::Data("{\"data\":\" spaced \"}".to_string()),
            StreamFrame::Event("done".to_string()),
            StreamFrame::Comment("ping".to_string()),
            StreamFrame::Data(String::new()),
        ];

        let wire: String = originals.iter().map(StreamFrame::encode).collect();
        let mut decoder = FrameDecoder::new();
        let decoded = collect(&mut decoder, &wire);
        assert_eq!(decoded, originals);
    }
}

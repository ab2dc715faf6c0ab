use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Frames are delimited by a blank line, SSE style.
const FRAME_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data:";

/// One structured event decoded from a stream frame. At most one field is
/// meaningfully populated per frame in practice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// StreamDecoder: bytes in, framed events out
// ---------------------------------------------------------------------------

/// Turns an incoming byte stream into a finite, non-restartable sequence of
/// [`StreamEvent`]s. Chunks arrive at arbitrary granularity: undelivered
/// bytes are buffered across calls, and UTF-8 characters split across chunk
/// boundaries decode correctly. Per-exchange; owns no other state.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Trailing bytes that did not yet form a complete UTF-8 character.
    pending_bytes: Vec<u8>,
    /// Decoded text not yet terminated by a frame delimiter.
    text: String,
    discarded: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        StreamDecoder::default()
    }

    /// Feed one byte chunk; returns every event completed by it, in order,
    /// together with the decode status.
    ///
    /// Frames without the `data:` prefix are ignored. A `data:` frame whose
    /// payload is not valid JSON is fatal for the exchange, but events
    /// decoded from well-formed frames earlier in the same chunk are still
    /// delivered alongside the error: what the caller sees must not depend
    /// on where the transport happened to split chunks.
    pub fn feed(&mut self, chunk: &[u8]) -> (Vec<StreamEvent>, Result<(), ChatError>) {
        self.decode_chunk(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.text.find(FRAME_DELIMITER) {
            let frame: String = self.text.drain(..pos + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..pos];

            if let Some(payload) = frame.strip_prefix(DATA_PREFIX) {
                match serde_json::from_str(payload) {
                    Ok(event) => events.push(event),
                    Err(e) => return (events, Err(e.into())),
                }
            } else if !frame.trim().is_empty() {
                tracing::trace!(len = frame.len(), "ignoring frame without data prefix");
            }
        }
        (events, Ok(()))
    }

    /// End of stream: a non-empty pending partial frame is a truncated,
    /// undelivered event. Discarded, not an error, but counted. A tail of
    /// nothing but whitespace is not counted; dangling undecoded bytes are.
    pub fn finish(&mut self) -> usize {
        if !self.pending_bytes.is_empty() || !self.text.trim().is_empty() {
            self.discarded += 1;
            tracing::debug!(
                pending = self.text.len() + self.pending_bytes.len(),
                "discarding truncated final frame"
            );
        }
        self.pending_bytes.clear();
        self.text.clear();
        self.discarded
    }

    /// How many truncated final frames this decoder has dropped.
    pub fn discarded_frames(&self) -> usize {
        self.discarded
    }

    /// Stateful incremental UTF-8 decode: an incomplete multi-byte sequence
    /// at the end of a chunk is held back until the next chunk; genuinely
    /// invalid bytes decode as U+FFFD.
    fn decode_chunk(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending_bytes);
        bytes.extend_from_slice(chunk);

        let mut input = &bytes[..];
        loop {
            match std::str::from_utf8(input) {
                Ok(s) => {
                    self.text.push_str(s);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&input[..valid]) {
                        self.text.push_str(s);
                    }
                    match e.error_len() {
                        // Incomplete sequence at the tail: wait for more bytes.
                        None => {
                            self.pending_bytes = input[valid..].to_vec();
                            return;
                        }
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid + len..];
                        }
                    }
                }
            }
        }
    }
}

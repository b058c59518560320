//! Incremental decoder for `text/event-stream` response bodies.
//!
//! Bytes are buffered until a full event is available, so multi-byte
//! characters split across network chunks are decoded intact.

use super::error::LlmError;

pub const MAX_SSE_BUFFER: usize = 10 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<(), LlmError> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_SSE_BUFFER {
            return Err(LlmError::Stream(
                "SSE buffer exceeded maximum size".to_string(),
            ));
        }
        Ok(())
    }

    /// Pop the next complete event's `data` payload. Events without data
    /// lines (comments, keep-alives) are skipped.
    pub fn next_payload(&mut self) -> Option<String> {
        while let Some((end, separator_len)) = find_event_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + separator_len).take(end).collect();
            if let Some(payload) = parse_event_payload(&String::from_utf8_lossy(&event)) {
                return Some(payload);
            }
        }
        None
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        let rest = rest.trim();
        if rest.is_empty() {
            return None;
        }
        parse_event_payload(rest)
    }
}

/// Earliest blank-line separator: `(event_end, separator_len)`.
fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    const SEPARATORS: [&[u8]; 3] = [b"\r\n\r\n", b"\n\n", b"\r\r"];

    SEPARATORS
        .iter()
        .filter_map(|sep| {
            buffer
                .windows(sep.len())
                .position(|w| w == *sep)
                .map(|pos| (pos, sep.len()))
        })
        .min_by_key(|(pos, _)| *pos)
}

fn parse_event_payload(event: &str) -> Option<String> {
    let mut payload_lines = Vec::new();
    for raw_line in event.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            payload_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }

    if payload_lines.is_empty() {
        None
    } else {
        Some(payload_lines.join("\n"))
    }
}

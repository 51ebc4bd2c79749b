//! Incremental decoder from response bytes to [`StreamFrame`]s.

use parley_types::{FrameParseError, SseLineDecoder, StreamFrame};

/// Turns arbitrarily split network reads into frames, in wire order.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    lines: SseLineDecoder,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every frame completed by `chunk`.
    ///
    /// Data records that carry neither content nor an error are dropped; a
    /// malformed record is returned as an `Err` so the caller can log it and
    /// carry on with the next one.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamFrame, FrameParseError>> {
        let mut frames: Vec<_> = self
            .lines
            .push(chunk)
            .iter()
            .filter_map(|payload| StreamFrame::parse_payload(payload).transpose())
            .collect();
        for _ in 0..self.lines.take_overflows() {
            frames.push(Err(FrameParseError::LineTooLong {
                limit: self.lines.limit(),
            }));
        }
        frames
    }

    /// Decode a final record that arrived without its line terminator.
    pub fn finish(&mut self) -> Option<Result<StreamFrame, FrameParseError>> {
        self.lines
            .finish()
            .and_then(|payload| StreamFrame::parse_payload(&payload).transpose())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

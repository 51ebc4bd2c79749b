//! Incremental splitter for `text/event-stream` bodies.
//!
//! Network reads do not respect record boundaries: a read can end in the
//! middle of a line or in the middle of a multi-byte UTF-8 sequence. The
//! decoder keeps the unterminated tail as raw bytes and only converts complete
//! lines to text, so `\n` (never part of a multi-byte sequence) is the only
//! boundary it has to look for.

/// Longest unterminated line kept in memory by default (1 MiB).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Buffers raw bytes and yields the payload of every complete `data:` line.
///
/// An unterminated line that grows past the limit is dropped, along with the
/// rest of it up to the next newline, and counted in
/// [`take_overflows`](Self::take_overflows).
#[derive(Debug)]
pub struct SseLineDecoder {
    pending: Vec<u8>,
    limit: usize,
    /// Inside an overlong line; bytes are discarded until the next `\n`.
    skipping: bool,
    overflows: usize,
}

impl Default for SseLineDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
            skipping: false,
            overflows: 0,
        }
    }

    /// Feed one read's worth of bytes; returns the `data:` payloads of every
    /// line completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut payloads = Vec::new();

        let mut chunk = chunk;
        if self.skipping {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    self.skipping = false;
                    chunk = &chunk[newline + 1..];
                }
                None => return payloads,
            }
        }
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(payload) = data_payload(&self.pending[start..end]) {
                payloads.push(payload);
            }
            start = end + 1;
        }
        self.pending.drain(..start);

        if self.pending.len() > self.limit {
            self.pending.clear();
            self.skipping = true;
            self.overflows += 1;
        }
        payloads
    }

    /// Flush a trailing line that was never terminated by a newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.skipping) {
            return None;
        }
        data_payload(&rest)
    }

    /// Bytes held back waiting for the rest of their line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of overlong lines dropped since the last call.
    pub fn take_overflows(&mut self) -> usize {
        std::mem::take(&mut self.overflows)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let value = line.strip_prefix(b"data:")?;
    let value = value.strip_prefix(b" ").unwrap_or(value);
    Some(String::from_utf8_lossy(value).into_owned())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn yields_complete_records_only() {
        let mut dec = SseLineDecoder::new();
        assert!(dec.push(b"data: {\"content\":\"He").is_empty());
        assert_eq!(dec.push(b"llo\"}\n\n"), vec![r#"{"content":"Hello"}"#]);
        assert_eq!(dec.pending_len(), 0);
    }

    #[test]
    fn several_records_in_one_read() {
        let mut dec = SseLineDecoder::new();
        let out = dec.push(b"data: a\n\ndata: b\n\ndata: [DONE]\n\n");
        assert_eq!(out, vec!["a", "b", "[DONE]"]);
    }

    #[test]
    fn multibyte_sequence_split_across_reads() {
        let bytes = "data: {\"content\":\"héllo\"}\n".as_bytes();
        // Split inside the two-byte 'é'.
        let cut = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut dec = SseLineDecoder::new();
        assert!(dec.push(&bytes[..cut]).is_empty());
        assert_eq!(dec.push(&bytes[cut..]), vec![r#"{"content":"héllo"}"#]);
    }

    #[test]
    fn ignores_non_data_lines_and_crlf() {
        let mut dec = SseLineDecoder::new();
        let out = dec.push(b": keep-alive\r\nevent: message\r\ndata:x\r\n\r\n");
        assert_eq!(out, vec!["x"]);
    }

    #[test]
    fn overlong_line_is_dropped_and_decoding_resumes() {
        let mut dec = SseLineDecoder::with_limit(16);
        assert!(dec.push(b"data: aaaaaaaaaaaa").is_empty());
        assert!(dec.push(b"aaaaaaaaaaaa").is_empty());
        assert_eq!(dec.pending_len(), 0);
        assert!(dec.push(b"still the same line").is_empty());
        assert_eq!(dec.pending_len(), 0);
        assert_eq!(dec.push(b"aa\ndata: ok\n\n"), vec!["ok"]);
        assert_eq!(dec.take_overflows(), 1);
        assert_eq!(dec.take_overflows(), 0);
    }

    #[test]
    fn finish_discards_an_overlong_tail() {
        let mut dec = SseLineDecoder::with_limit(4);
        assert!(dec.push(b"data: [DONE]").is_empty());
        assert_eq!(dec.finish(), None);
        assert_eq!(dec.push(b"data: x\n"), vec!["x"]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut dec = SseLineDecoder::new();
        assert!(dec.push(b"data: [DONE]").is_empty());
        assert_eq!(dec.finish().as_deref(), Some("[DONE]"));
        assert_eq!(dec.finish(), None);
    }
}

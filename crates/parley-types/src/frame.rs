//! Event-stream frames.
//!
//! Every frame travels as a single `data: <payload>` record followed by a
//! blank line. Content and error frames carry a JSON object; the terminal
//! sentinel is the literal [`DONE_SENTINEL`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload of the frame that marks the intended end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Field prefix of an event-stream data record.
pub const DATA_PREFIX: &str = "data: ";

/// One unit of the streaming wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// An incremental piece of assistant text.
    Content(String),
    /// The producer failed mid-stream. No sentinel follows.
    Error(String),
    /// Terminal sentinel.
    Done,
}

/// A data record that could not be understood.
#[derive(Debug, Error)]
pub enum FrameParseError {
    #[error("malformed frame payload {payload:?}: {source}")]
    Json {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("data record longer than {limit} bytes dropped")]
    LineTooLong { limit: usize },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FramePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StreamFrame {
    /// The text that follows `data: ` on the wire.
    pub fn payload(&self) -> String {
        let body = match self {
            StreamFrame::Done => return DONE_SENTINEL.to_owned(),
            StreamFrame::Content(delta) => FramePayload {
                content: Some(delta.clone()),
                error: None,
            },
            StreamFrame::Error(message) => FramePayload {
                content: None,
                error: Some(message.clone()),
            },
        };
        // A struct of two optional strings always serializes.
        serde_json::to_string(&body).unwrap_or_default()
    }

    /// Full wire record including the trailing blank line.
    pub fn encode(&self) -> String {
        format!("{DATA_PREFIX}{}\n\n", self.payload())
    }

    /// Parse the payload of one `data:` record.
    ///
    /// Returns `Ok(None)` for a well-formed object that carries neither a
    /// content delta nor an error, e.g. `{}`.
    pub fn parse_payload(data: &str) -> Result<Option<Self>, FrameParseError> {
        if data == DONE_SENTINEL {
            return Ok(Some(StreamFrame::Done));
        }
        let parsed: FramePayload =
            serde_json::from_str(data).map_err(|source| FrameParseError::Json {
                payload: data.to_owned(),
                source,
            })?;
        Ok(match (parsed.error, parsed.content) {
            (Some(message), _) => Some(StreamFrame::Error(message)),
            (None, Some(delta)) => Some(StreamFrame::Content(delta)),
            (None, None) => None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Done | StreamFrame::Error(_))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn content_frame_wire_format() {
        let frame = StreamFrame::Content("Hello ".into());
        assert_eq!(frame.encode(), "data: {\"content\":\"Hello \"}\n\n");
    }

    #[test]
    fn sentinel_wire_format() {
        assert_eq!(StreamFrame::Done.encode(), "data: [DONE]\n\n");
    }

    #[test]
    fn content_with_newlines_stays_on_one_line() {
        let encoded = StreamFrame::Content("a\nb\r\n".into()).encode();
        assert_eq!(encoded.matches('\n').count(), 2);
        assert!(encoded.ends_with("\n\n"));
    }

    #[test]
    fn parse_recognises_each_kind() {
        assert_eq!(
            StreamFrame::parse_payload("[DONE]").unwrap(),
            Some(StreamFrame::Done)
        );
        assert_eq!(
            StreamFrame::parse_payload(r#"{"content":"x"}"#).unwrap(),
            Some(StreamFrame::Content("x".into()))
        );
        assert_eq!(
            StreamFrame::parse_payload(r#"{"error":"boom"}"#).unwrap(),
            Some(StreamFrame::Error("boom".into()))
        );
        assert_eq!(StreamFrame::parse_payload("{}").unwrap(), None);
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = StreamFrame::parse_payload("{\"content\":").unwrap_err();
        assert!(err.to_string().contains("malformed frame payload"));
        assert!(StreamFrame::parse_payload(r#"{"content":5}"#).is_err());
    }

    #[test]
    fn only_done_and_error_are_terminal() {
        assert!(StreamFrame::Done.is_terminal());
        assert!(StreamFrame::Error("e".into()).is_terminal());
        assert!(!StreamFrame::Content("c".into()).is_terminal());
    }
}

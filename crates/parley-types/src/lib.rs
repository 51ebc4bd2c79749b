//! Shared types for the parley chat pipeline.
//!
//! - [`chat`]: messages, attachments and the chat session.
//! - [`prompt`]: the role/content sequence handed to a model provider.
//! - [`frame`]: the event-stream frames exchanged between server and client.
//! - [`sse`]: an incremental `data:` line splitter used on both ends.

pub mod chat;
pub mod frame;
pub mod prompt;
pub mod sse;

pub use chat::{Attachment, ChatSession, Message, MessageStatus, Role};
pub use frame::{FrameParseError, StreamFrame, DONE_SENTINEL};
pub use prompt::{PromptMessage, PromptRole};
pub use sse::{MAX_LINE_BYTES, SseLineDecoder};

/// Upper bound on a single attachment, enforced by the client before a file is
/// attached and by the server per uploaded part.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

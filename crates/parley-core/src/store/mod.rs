//! Chat session store.
//!
//! The store owns the single active [`ChatSession`] and drives each turn
//! through `Idle → Sending → Streaming → (Idle | Error)`. Every mutation is
//! published as a [`ChatSnapshot`] on a watch channel; observers never write.
//!
//! Turns are serialized: the store refuses a second `send_message` while one
//! is in flight. [`ChatStore::clear_chat`] bumps the snapshot `generation`,
//! which both cancels the running turn at its next suspension point and makes
//! any late write from it a no-op.


use std::sync::Arc;

use futures::StreamExt;
use parley_types::{Attachment, ChatSession, FrameParseError, Message, MessageStatus, StreamFrame};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::attachment::{self, AttachmentError};
use crate::decoder::FrameDecoder;
use crate::transport::{ChatTransport, FilePart, TurnRequest};

/// Error shown when the request could not be issued or was refused.
pub const SEND_FAILED: &str = "Failed to send message";

/// Error shown when the reply stream broke off with a transport error.
pub const CONNECTION_LOST: &str = "Connection lost while streaming";

/// Where the store is in the current turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TurnState {
    #[default]
    Idle,
    /// Request issued, response headers not yet received.
    Sending,
    /// Reply deltas are being appended.
    Streaming,
    /// The last turn failed. Cleared when the next turn starts.
    Error(String),
}

impl TurnState {
    /// `true` while a turn owns the session.
    pub fn is_loading(&self) -> bool {
        matches!(self, TurnState::Sending | TurnState::Streaming)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TurnState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Observer view of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub session: Option<ChatSession>,
    pub state: TurnState,
    /// Bumped by every `clear_chat`.
    pub generation: u64,
}

/// How a `send_message` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing to send; state untouched.
    Skipped,
    /// The reply ended with the terminal sentinel.
    Completed,
    /// The stream closed without a sentinel; the reply is marked incomplete.
    Incomplete,
    /// The request or the reply failed; see [`TurnState::Error`].
    Failed,
    /// `clear_chat` discarded the session while the turn was running.
    Cancelled,
}

/// Precondition violations. Network and provider failures are not errors of
/// `send_message`; they end up in [`TurnState::Error`].
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("a turn is already in flight")]
    TurnInFlight,

    /// The text is blank and none of the attachments carries an uploadable
    /// payload, so the request would be empty.
    #[error("nothing to send: the message is empty and no attachment has content")]
    NothingToSend,

    #[error(transparent)]
    Attachment(#[from] AttachmentError),
}

pub struct ChatStore {
    transport: Arc<dyn ChatTransport>,
    snapshot: watch::Sender<ChatSnapshot>,
    /// Latest generation; lets a running turn wait for cancellation.
    cancel: watch::Sender<u64>,
}

impl std::fmt::Debug for ChatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot.borrow();
        f.debug_struct("ChatStore")
            .field("state", &snap.state)
            .field("generation", &snap.generation)
            .finish_non_exhaustive()
    }
}

impl ChatStore {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        let (snapshot, _) = watch::channel(ChatSnapshot::default());
        let (cancel, _) = watch::channel(0);
        Self {
            transport,
            snapshot,
            cancel,
        }
    }

    /// Receiver that is notified after every published change.
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().state.is_loading()
    }

    /// Drop the session, clear any error and cancel the running turn.
    pub fn clear_chat(&self) {
        let mut generation = 0;
        self.snapshot.send_modify(|snap| {
            snap.generation += 1;
            snap.session = None;
            snap.state = TurnState::Idle;
            generation = snap.generation;
        });
        self.cancel.send_replace(generation);
        debug!(generation, "chat cleared");
    }

    /// Send one user turn and stream the reply into the session.
    ///
    /// The user message is appended before any network activity. The returned
    /// future resolves when the reply has finished, failed, or was cancelled;
    /// dropping it early leaves the store idle with the partial reply marked
    /// incomplete.
    pub async fn send_message(
        &self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<TurnOutcome, ChatError> {
        if text.trim().is_empty() && attachments.is_empty() {
            return Ok(TurnOutcome::Skipped);
        }
        for att in &attachments {
            attachment::ensure_within_limit(att)?;
        }

        let files = file_parts(&attachments);
        if text.trim().is_empty() && files.is_empty() {
            return Err(ChatError::NothingToSend);
        }
        let user_message = Message::user(text, attachments);
        let message_id = user_message.id.clone();

        let mut claimed = None;
        self.snapshot.send_if_modified(|snap| {
            if snap.state.is_loading() {
                return false;
            }
            let session = snap.session.get_or_insert_with(ChatSession::new);
            let history: Vec<Message> =
                session.messages.iter().map(Message::for_history).collect();
            session.push(user_message);
            snap.state = TurnState::Sending;
            claimed = Some((snap.generation, history));
            true
        });
        let (generation, history) = claimed.ok_or(ChatError::TurnInFlight)?;

        let _guard = TurnGuard {
            snapshot: &self.snapshot,
            generation,
        };
        let request = TurnRequest {
            message: text.to_owned(),
            history,
            files,
        };

        let span = info_span!("chat_turn", generation, message_id = %message_id);
        let outcome = self.run_turn(generation, request).instrument(span).await;
        Ok(outcome)
    }

    async fn run_turn(&self, generation: u64, request: TurnRequest) -> TurnOutcome {
        let mut cancel_rx = self.cancel.subscribe();

        let opened = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx, generation) => return TurnOutcome::Cancelled,
            opened = self.transport.open(request) => opened,
        };
        let mut body = match opened {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "chat request failed");
                self.fail(generation, None, SEND_FAILED);
                return TurnOutcome::Failed;
            }
        };

        let reply = Message::assistant_placeholder();
        let reply_id = reply.id.clone();
        let started = self.update(generation, |snap| {
            if let Some(session) = snap.session.as_mut() {
                session.push(reply);
            }
            snap.state = TurnState::Streaming;
        });
        if !started {
            return TurnOutcome::Cancelled;
        }

        let mut decoder = FrameDecoder::new();
        loop {
            let read = tokio::select! {
                biased;
                _ = cancelled(&mut cancel_rx, generation) => {
                    debug!("turn cancelled; dropping response body");
                    return TurnOutcome::Cancelled;
                }
                read = body.next() => read,
            };
            match read {
                Some(Ok(bytes)) => {
                    for frame in decoder.push(&bytes) {
                        if let Some(outcome) = self.apply(generation, &reply_id, frame) {
                            return outcome;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "reply stream interrupted");
                    self.fail(generation, Some(&reply_id), CONNECTION_LOST);
                    return TurnOutcome::Failed;
                }
                None => break,
            }
        }

        if let Some(frame) = decoder.finish() {
            if let Some(outcome) = self.apply(generation, &reply_id, frame) {
                return outcome;
            }
        }

        warn!("reply stream closed without terminal sentinel");
        if self.finish_reply(generation, &reply_id, MessageStatus::Incomplete, TurnState::Idle) {
            TurnOutcome::Incomplete
        } else {
            TurnOutcome::Cancelled
        }
    }

    /// Fold one decoded frame into the reply. `Some` ends the turn.
    fn apply(
        &self,
        generation: u64,
        reply_id: &str,
        frame: Result<StreamFrame, FrameParseError>,
    ) -> Option<TurnOutcome> {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "skipping malformed stream frame");
                return None;
            }
        };

        match frame {
            StreamFrame::Content(delta) if delta.is_empty() => None,
            StreamFrame::Content(delta) => {
                let applied = self.update(generation, |snap| {
                    if let Some(session) = snap.session.as_mut() {
                        if let Some(reply) = session.message_mut(reply_id) {
                            reply.content.push_str(&delta);
                        }
                        session.touch();
                    }
                });
                (!applied).then_some(TurnOutcome::Cancelled)
            }
            StreamFrame::Done => {
                info!("reply complete");
                Some(
                    if self.finish_reply(generation, reply_id, MessageStatus::Complete, TurnState::Idle) {
                        TurnOutcome::Completed
                    } else {
                        TurnOutcome::Cancelled
                    },
                )
            }
            StreamFrame::Error(message) => {
                warn!(error = %message, "producer reported a failure mid-stream");
                Some(if self.fail(generation, Some(reply_id), &message) {
                    TurnOutcome::Failed
                } else {
                    TurnOutcome::Cancelled
                })
            }
        }
    }

    fn fail(&self, generation: u64, reply_id: Option<&str>, message: &str) -> bool {
        match reply_id {
            Some(id) => self.finish_reply(
                generation,
                id,
                MessageStatus::Failed,
                TurnState::Error(message.to_owned()),
            ),
            None => self.update(generation, |snap| {
                snap.state = TurnState::Error(message.to_owned());
            }),
        }
    }

    fn finish_reply(
        &self,
        generation: u64,
        reply_id: &str,
        status: MessageStatus,
        state: TurnState,
    ) -> bool {
        self.update(generation, |snap| {
            if let Some(session) = snap.session.as_mut() {
                if let Some(reply) = session.message_mut(reply_id) {
                    reply.status = status;
                }
                session.touch();
            }
            snap.state = state;
        })
    }

    /// Apply `f` unless the session was cleared since the turn began.
    /// Returns whether the change was published.
    fn update(&self, generation: u64, f: impl FnOnce(&mut ChatSnapshot)) -> bool {
        self.snapshot.send_if_modified(|snap| {
            if snap.generation != generation {
                return false;
            }
            f(snap);
            true
        })
    }
}

/// Resets a turn that is abandoned without reaching a terminal state, e.g.
/// because the caller dropped the `send_message` future.
struct TurnGuard<'a> {
    snapshot: &'a watch::Sender<ChatSnapshot>,
    generation: u64,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.snapshot.send_if_modified(|snap| {
            if snap.generation != self.generation || !snap.state.is_loading() {
                return false;
            }
            if let Some(session) = snap.session.as_mut() {
                for msg in &mut session.messages {
                    if msg.status == MessageStatus::Streaming {
                        msg.status = MessageStatus::Incomplete;
                    }
                }
            }
            snap.state = TurnState::Idle;
            true
        });
    }
}

/// Resolves once `clear_chat` has moved past `generation`.
async fn cancelled(rx: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        if *rx.borrow_and_update() > generation {
            return;
        }
        if rx.changed().await.is_err() {
            // Store dropped; nothing will ever cancel this turn.
            std::future::pending::<()>().await;
        }
    }
}

/// Raw multipart parts for the attachments that carry an inline payload.
fn file_parts(attachments: &[Attachment]) -> Vec<FilePart> {
    attachments
        .iter()
        .enumerate()
        .filter_map(|(index, att)| match attachment::decode_payload(att) {
            Ok(Some(bytes)) => Some(FilePart {
                field: format!("file_{index}"),
                file_name: att.name.clone(),
                mime_type: if att.mime_type.trim().is_empty() {
                    "application/octet-stream".to_owned()
                } else {
                    att.mime_type.clone()
                },
                bytes,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "attachment skipped");
                None
            }
        })
        .collect()
}

//! `POST /api/chat`: one chat turn, answered as an event stream.
//!
//! The request is a multipart form with a `message` text field, an optional
//! `messages` field holding the prior conversation as JSON, and any number of
//! `file_<n>` file parts. The reply is a sequence of `data:` frames:
//! `{"content": "..."}` per text delta, then `[DONE]`, or a single
//! `{"error": "..."}` if the provider fails mid-reply.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures::{Stream, StreamExt, stream};
use parley_types::StreamFrame;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::ServerError;
use crate::prompt::{UploadedFile, build_prompt, parse_history};
use crate::provider::TokenStream;
use crate::state::AppState;

/// Error text sent to the client when the provider fails mid-reply.
pub const STREAM_FAILED: &str = "Failed to generate response";

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/chat", post(chat_stream))
}

#[derive(Debug, Default)]
struct ChatForm {
    message: Option<String>,
    messages: Option<String>,
    files: Vec<UploadedFile>,
}

impl ChatForm {
    /// Drain the multipart body. File contents are counted, not kept.
    async fn read(mut multipart: Multipart, max_file_bytes: u64) -> Result<Self, ServerError> {
        let mut form = ChatForm::default();
        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "message" => form.message = Some(field.text().await?),
                "messages" => form.messages = Some(field.text().await?),
                n if n.starts_with("file_") => {
                    let file_name = field.file_name().unwrap_or(n).to_owned();
                    let mime_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned();
                    let mut size = 0u64;
                    while let Some(chunk) = field.chunk().await? {
                        size += chunk.len() as u64;
                        if size > max_file_bytes {
                            return Err(ServerError::PayloadTooLarge(format!(
                                "File {file_name} is too large. Maximum size is {}MB.",
                                max_file_bytes / (1024 * 1024)
                            )));
                        }
                    }
                    form.files.push(UploadedFile {
                        name: file_name,
                        mime_type,
                        size,
                    });
                }
                other => debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }
}

pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let form = ChatForm::read(multipart, state.config.max_file_bytes).await?;

    // A turn may consist of attachments alone; otherwise the text is required.
    let message = form
        .message
        .filter(|m| !m.is_empty() || !form.files.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Message is required".into()))?;

    let history = parse_history(form.messages.as_deref());
    let turn_id = Uuid::new_v4();
    info!(
        %turn_id,
        provider = state.provider.name(),
        history_len = history.len(),
        files = form.files.len(),
        "chat turn accepted"
    );

    let prompt = build_prompt(history, &message, &form.files);
    let tokens = state.provider.stream_chat(prompt).await?;

    let events = frame_stream(tokens)
        .map(|frame| Ok::<Event, Infallible>(Event::default().data(frame.payload())));

    Ok(([(header::CONNECTION, "keep-alive")], Sse::new(events)).into_response())
}

/// Map provider output to wire frames: one `Content` per delta, then `Done`.
/// A provider error becomes a single `Error` frame and nothing follows it.
pub fn frame_stream(tokens: TokenStream) -> impl Stream<Item = StreamFrame> + Send {
    stream::unfold(Some(tokens), |state| async move {
        let Some(mut tokens) = state else {
            return None;
        };
        match tokens.next().await {
            Some(Ok(delta)) => Some((StreamFrame::Content(delta), Some(tokens))),
            Some(Err(e)) => {
                error!(error = %e, "provider failed mid-reply");
                Some((StreamFrame::Error(STREAM_FAILED.to_owned()), None))
            }
            None => {
                debug!("provider reply finished");
                Some((StreamFrame::Done, None))
            }
        }
    })
}

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parley_types::{DONE_SENTINEL, PromptMessage, SseLineDecoder};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatProvider, ProviderError, TokenStream};

/// Streams completions from an OpenAI-compatible `/chat/completions` API.
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamError {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn stream_chat(&self, prompt: Vec<PromptMessage>) -> Result<TokenStream, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages: &prompt,
                stream: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(model = %self.model, "provider stream opened");
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProviderError::from))
            .boxed();
        Ok(completion_deltas(body).boxed())
    }
}

struct Upstream {
    body: BoxStream<'static, Result<Bytes, ProviderError>>,
    lines: SseLineDecoder,
    queue: VecDeque<Result<String, ProviderError>>,
    finished: bool,
}

impl Upstream {
    /// Queue the deltas carried by one `data:` payload.
    fn absorb(&mut self, payload: &str) {
        if self.finished {
            return;
        }
        if payload.trim() == DONE_SENTINEL {
            self.finished = true;
            return;
        }
        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "skipping unreadable provider chunk");
                return;
            }
        };
        if let Some(err) = chunk.error {
            self.queue.push_back(Err(ProviderError::Upstream(err.message)));
            self.finished = true;
            return;
        }
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                self.queue.push_back(Ok(content));
            }
            if choice.finish_reason.is_some() {
                self.finished = true;
            }
        }
    }
}

/// Turn an OpenAI-style event-stream body into non-empty text deltas.
///
/// Ends at `[DONE]`, at a `finish_reason`, or when the body closes. A
/// transport error or an in-band `error` object is yielded once and ends the
/// stream.
fn completion_deltas(
    body: BoxStream<'static, Result<Bytes, ProviderError>>,
) -> impl futures::Stream<Item = Result<String, ProviderError>> + Send + 'static {
    deltas(Upstream {
        body,
        lines: SseLineDecoder::new(),
        queue: VecDeque::new(),
        finished: false,
    })
}

fn deltas(
    upstream: Upstream,
) -> impl futures::Stream<Item = Result<String, ProviderError>> + Send + 'static {
    stream::unfold(upstream, |mut up| async move {
        loop {
            if let Some(item) = up.queue.pop_front() {
                return Some((item, up));
            }
            if up.finished {
                return None;
            }
            match up.body.next().await {
                Some(Ok(bytes)) => {
                    for payload in up.lines.push(&bytes) {
                        up.absorb(&payload);
                    }
                    let dropped = up.lines.take_overflows();
                    if dropped > 0 {
                        warn!(dropped, limit = up.lines.limit(), "dropping overlong provider lines");
                    }
                }
                Some(Err(e)) => {
                    up.finished = true;
                    return Some((Err(e), up));
                }
                None => {
                    if let Some(payload) = up.lines.finish() {
                        up.absorb(&payload);
                    }
                    up.finished = true;
                }
            }
        }
    })
}

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use parley_types::PromptMessage;
use tracing::debug;

use super::{ChatProvider, ProviderError, TokenStream};

pub const MOCK_RESPONSE: &str = "I'm a mock AI assistant. To enable real AI responses, please set \
the PARLEY_API_KEY environment variable. You can get an API key from https://platform.openai.com/api-keys";

/// Replays [`MOCK_RESPONSE`] word by word, ignoring the prompt.
#[derive(Debug, Clone)]
pub struct MockProvider {
    delay: Duration,
}

impl MockProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Split `text` on spaces, keeping the separator on every word but the last,
/// so the chunks concatenate back to `text`.
pub fn mock_chunks(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split(' ').collect();
    let last = words.len().saturating_sub(1);
    words
        .into_iter()
        .enumerate()
        .map(|(i, w)| if i < last { format!("{w} ") } else { w.to_owned() })
        .collect()
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn stream_chat(&self, prompt: Vec<PromptMessage>) -> Result<TokenStream, ProviderError> {
        debug!(prompt_messages = prompt.len(), "mock provider replying");
        let delay = self.delay;
        let chunks = stream::iter(mock_chunks(MOCK_RESPONSE).into_iter().enumerate()).then(
            move |(i, chunk)| async move {
                if i > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(chunk)
            },
        );
        Ok(chunks.boxed())
    }
}

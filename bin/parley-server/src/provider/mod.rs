//! Model providers.
//!
//! A [`ChatProvider`] turns a prompt into a stream of text deltas. The server
//! picks one at startup: [`OpenAiProvider`] when an API key is configured,
//! [`MockProvider`] otherwise.

mod mock;
mod openai;

pub use mock::{MOCK_RESPONSE, MockProvider, mock_chunks};
pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use parley_types::PromptMessage;
use thiserror::Error;

use crate::config::Config;

/// Text deltas in arrival order. An `Err` item ends the stream.
pub type TokenStream = BoxStream<'static, Result<String, ProviderError>>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("provider reported an error: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    /// Short label for logs and `/health`.
    fn name(&self) -> &'static str;

    /// Start generating a reply. Errors returned here happen before any
    /// output and are reported to the caller as a failed request.
    async fn stream_chat(&self, prompt: Vec<PromptMessage>) -> Result<TokenStream, ProviderError>;
}

/// Select the provider described by `cfg`.
pub fn from_config(cfg: &Config) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    match &cfg.api_key {
        Some(key) => Ok(Arc::new(OpenAiProvider::new(
            &cfg.api_base_url,
            key,
            &cfg.model,
        )?)),
        None => Ok(Arc::new(MockProvider::new(cfg.mock_delay))),
    }
}

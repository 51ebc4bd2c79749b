//! Client configuration, loaded from environment variables.

use std::time::Duration;

/// Where and how the store talks to the chat endpoint.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full URL of the streaming chat endpoint
    /// (default: `"http://127.0.0.1:3000/api/chat"`).
    pub endpoint: String,

    /// TCP connect timeout. No overall request timeout is applied; a reply
    /// stream stays open for as long as the provider keeps talking.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/api/chat".to_owned(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Build [`ClientConfig`] from `PARLEY_ENDPOINT` and
    /// `PARLEY_CONNECT_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("PARLEY_ENDPOINT").unwrap_or(defaults.endpoint),
            connect_timeout: std::env::var("PARLEY_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::provider::ChatProvider;

#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Model provider selected at startup.
    pub provider: Arc<dyn ChatProvider>,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
        }
    }
}

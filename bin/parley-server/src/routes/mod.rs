//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - Middleware layers (body limit, CORS, per-request trace-ID injection)
//! - Health / heartbeat route
//! - The streaming chat route

pub mod chat;
mod health;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{Router, middleware};
use tower::ServiceBuilder;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(chat::router())
        // Outermost layers execute first on the way in.
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(trace::trace_middleware))
                .layer(cors::cors_layer(&state.config))
                .layer(DefaultBodyLimit::max(state.config.max_request_bytes)),
        )
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

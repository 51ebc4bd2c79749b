//! Unified server error type.
//!
//! Handlers return `Result<T, ServerError>`; the [`IntoResponse`] impl turns
//! an error into a `{"error": "..."}` JSON body with a matching status code.
//!
//! Provider and internal failures are logged in full but reach the caller
//! only as a generic message, so upstream URLs and keys never leak.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or incomplete form.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An uploaded file or the whole body exceeded its limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The model provider refused the turn before any output was produced.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
            ServerError::Provider(e) => {
                error!(error = %e, "model provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    "model provider unavailable".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for ServerError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(e.body_text())
        } else {
            ServerError::BadRequest(e.body_text())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn statuses_match_variants() {
        let cases = [
            (ServerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (
                ServerError::Provider(ProviderError::Upstream("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (ServerError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}

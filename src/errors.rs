//! Application error types
//!
//! Two layers: `AppError` for the HTTP surface (converted into responses),
//! and `SessionError` for per-call relay failures. Transport failures end
//! the call; everything softer is logged and the session continues.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced through the HTTP/WebSocket entry points.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("session setup failed: {0}")]
    SessionSetup(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) | AppError::SessionSetup(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        tracing::error!(error = %self, "request failed");
        (status, self.to_string()).into_response()
    }
}

/// Errors inside one call's relay loop.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The model-side connection could not be established or dropped.
    #[error("model session error: {0}")]
    Model(#[from] crate::core::realtime::RealtimeError),

    /// The telephony-side WebSocket failed.
    #[error("telephony transport error: {0}")]
    Telephony(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_error_maps_to_500() {
        let resp = AppError::SessionSetup("no model connection".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

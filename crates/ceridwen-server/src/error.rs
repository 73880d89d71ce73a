//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use ceridwen_engine::EngineError;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Admission denied.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    /// All run slots are occupied.
    #[error("Service busy: {0}")]
    Busy(String),

    /// Database/storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ServerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(id) => ServerError::NotFound(format!("run {id}")),
            EngineError::InvalidState { .. } => ServerError::BadRequest(e.to_string()),
            EngineError::Busy => ServerError::Busy(e.to_string()),
            EngineError::Storage(inner) => ServerError::Storage(inner.to_string()),
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Present on 429 responses.
    #[serde(skip_serializing_if = "Option::is_none", rename = "retryAfterSeconds")]
    pub retry_after_seconds: Option<u64>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            ServerError::Busy(_) => (StatusCode::SERVICE_UNAVAILABLE, "busy"),
            ServerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = self.to_string();

        match &self {
            ServerError::Storage(_) | ServerError::Internal(_) => {
                tracing::error!(status = %status, code, error = %message, "Server error");
            }
            _ => {
                tracing::warn!(status = %status, code, error = %message, "Client error");
            }
        }

        let retry_after_seconds = match &self {
            ServerError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message,
            retry_after_seconds,
        };

        match retry_after_seconds {
            Some(secs) => {
                (status, [("Retry-After", secs.to_string())], Json(body)).into_response()
            }
            None => (status, Json(body)).into_response(),
        }
    }
}

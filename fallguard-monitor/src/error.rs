//! Error types for fallguard-monitor
//!
//! `Error` covers the coordinator and service plumbing; `ApiError` maps
//! those onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fallguard_common::events::TrackId;
use serde_json::json;
use thiserror::Error;

/// Main error type for fallguard-monitor
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Decision referenced an id that is not the pending one
    #[error("Invalid ID: decision for track {track_id} but pending is {pending:?}")]
    StaleDecision {
        track_id: TrackId,
        pending: Option<TrackId>,
    },

    /// Dispatch worker unavailable
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Malformed replay script line
    #[error("Replay error at line {line}: {message}")]
    Replay { line: usize, message: String },

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// fallguard-common error
    #[error(transparent)]
    Common(#[from] fallguard_common::Error),
}

/// Convenience Result type using fallguard-monitor Error
pub type Result<T> = std::result::Result<T, Error>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Decision for an id that is not pending (400)
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::StaleDecision { .. } => ApiError::InvalidId(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::InvalidId(msg) => (StatusCode::BAD_REQUEST, "INVALID_ID", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

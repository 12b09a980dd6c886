//! Error types for shellmatch-engine
//!
//! `MatchError` carries the per-record failure kinds of a batch run. Only
//! `Configuration` aborts a run; every other kind is recovered locally and
//! surfaced as a `reason` on the affected result. `ApiError` is the HTTP
//! surface error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Batch pipeline error kinds
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MatchError {
    /// Malformed account id
    #[error("Malformed account id {0:?}")]
    Validation(String),

    /// Id not present in the account directory
    #[error("Account {0} not found in directory")]
    NotFound(String),

    /// A directory chunk request failed as a whole
    #[error("Directory chunk {chunk} failed: {message}")]
    ChunkFetch { chunk: usize, message: String },

    /// External assessment exceeded the per-call timeout
    #[error("Assessment timed out after {0:?}")]
    AssessmentTimeout(Duration),

    /// External assessment response failed schema validation
    #[error("Assessment response rejected: {0}")]
    AssessmentSchema(String),

    /// Invalid batch configuration (fatal at job start)
    #[error("Invalid batch configuration: {0}")]
    Configuration(String),
}

impl MatchError {
    /// Only configuration errors abort a batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, MatchError::Configuration(_))
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::Configuration(_) | MatchError::Validation(_) => {
                ApiError::BadRequest(err.to_string())
            }
            MatchError::NotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
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
pub type ApiResult<T> = Result<T, ApiError>;

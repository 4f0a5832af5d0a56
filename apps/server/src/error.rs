//! Error handling for the server API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use raid_core::EngineError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Catalog exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownTrack(_) | EngineError::InvalidBossLevel(_) => {
                ApiError::Validation(err.to_string())
            }
            EngineError::EmptyPool { .. } => ApiError::ResourceExhausted(err.to_string()),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            ApiError::StateConflict(_) => (StatusCode::CONFLICT, "state_conflict"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::ResourceExhausted(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "resource_exhausted")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        // Misconfigured catalogs must be loud, never silently defaulted.
        if matches!(self, ApiError::ResourceExhausted(_) | ApiError::Internal(_)) {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

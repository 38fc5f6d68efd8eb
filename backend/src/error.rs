//! Error handling for the Farm Operations backend
//!
//! Store, engine and HTTP layers share one error type so failures propagate
//! with `?` and render as consistent JSON responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Store errors
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(#[from] shared::ParseError),

    // External service errors
    #[error("LINE API error: {0}")]
    LineApiError(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InvalidStateTransition(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE_TRANSITION")
            }
            AppError::StorageError(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR"),
            AppError::CorruptRecord(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CORRUPT_RECORD"),
            AppError::LineApiError(_) => (StatusCode::BAD_GATEWAY, "LINE_API_ERROR"),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let error_detail = ErrorDetail {
            code: code.to_string(),
            message: self.public_message(),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

//! Error type system for the Conductor backend
//!
//! This module provides:
//! - A single error enum shared by repositories, services and handlers
//! - HTTP status code mapping
//! - Client-safe error bodies with trace IDs (internals stay in the logs)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Main error type for the Conductor backend
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // System-level errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    PoolError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Task error: {0}")]
    TaskError(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request. Duplicates stay 400 for client compatibility.
            AppError::InvalidRequest(_) | AppError::ValidationError(_) | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }

            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,

            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,

            AppError::NotFound(_) => StatusCode::NOT_FOUND,

            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,

            AppError::ConfigError(_)
            | AppError::DatabaseError(_)
            | AppError::PoolError(_)
            | AppError::CacheError(_)
            | AppError::InternalError(_)
            | AppError::TaskError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type name for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::ConfigError(_) => "ConfigError",
            AppError::DatabaseError(_) => "DatabaseError",
            AppError::PoolError(_) => "PoolError",
            AppError::CacheError(_) => "CacheError",
            AppError::InternalError(_) => "InternalError",
            AppError::TaskError(_) => "TaskError",
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::ValidationError(_) => "ValidationError",
            AppError::Conflict(_) => "Conflict",
            AppError::AuthenticationError(_) => "AuthenticationError",
            AppError::PermissionDenied(_) => "PermissionDenied",
            AppError::NotFound(_) => "NotFound",
            AppError::Timeout(_) => "Timeout",
        }
    }

    /// The message shown to API clients.
    ///
    /// Client errors carry their own short message. Server errors collapse to
    /// a generic string so driver messages and SQL never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            AppError::InvalidRequest(msg)
            | AppError::ValidationError(msg)
            | AppError::Conflict(msg)
            | AppError::AuthenticationError(msg)
            | AppError::PermissionDenied(msg)
            | AppError::NotFound(msg)
            | AppError::Timeout(msg) => msg.clone(),
            AppError::ConfigError(_) => "Server misconfiguration".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Whether this error is the server's fault
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::PoolError(err.to_string())
    }
}

/// Error response structure for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique trace ID for this error
    pub trace_id: String,
}

impl ErrorResponse {
    /// Create a new error response with a generated trace ID
    pub fn new(error: String, message: String) -> Self {
        Self {
            error,
            message,
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an error response from an AppError
    pub fn from_error(error: &AppError) -> Self {
        Self::new(error.error_type().to_string(), error.public_message())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (trace_id: {})", self.error, self.message, self.trace_id)
    }
}

/// Implement IntoResponse for AppError to enable automatic error handling in Axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = ErrorResponse::from_error(&self);

        if self.is_server_error() {
            tracing::error!(
                error_type = self.error_type(),
                trace_id = %error_response.trace_id,
                status_code = %status_code,
                "Request failed: {}",
                self
            );
        } else {
            tracing::warn!(
                error_type = self.error_type(),
                trace_id = %error_response.trace_id,
                status_code = %status_code,
                "Request rejected: {}",
                self
            );
        }

        (status_code, Json(error_response)).into_response()
    }
}

/// Result type alias for operations that can fail with AppError
pub type Result<T> = std::result::Result<T, AppError>;

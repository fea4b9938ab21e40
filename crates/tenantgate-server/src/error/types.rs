//! Gateway error types.

use axum::http::StatusCode;
use std::collections::HashMap;
use thiserror::Error;

/// Result type for gateway operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error taxonomy shared by every gateway stage and handler.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("Validation failed: {message}")]
    ValidationFailed {
        message: String,
        fields: HashMap<String, Vec<String>>,
    },

    // 401 Unauthorized
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    // 403 Forbidden
    #[error("{0}")]
    Forbidden(String),

    #[error("Missing '{action}' permission on module '{module}'")]
    PermissionDenied { module: String, action: String },

    // 404 Not Found
    #[error("{0} not found")]
    NotFound(String),

    // 405 Method Not Allowed
    #[error("Method not allowed")]
    MethodNotAllowed,

    // 408 Request Timeout
    #[error("Request timed out")]
    RequestTimeout,

    // 413 Payload Too Large
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    // 429 Too Many Requests
    #[error("Rate limit exceeded")]
    TooManyRequests { retry_after: u64 },

    // 500 Internal Server Error
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    /// Validation failure without per-field details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    /// Forbidden with a human-readable reason.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationFailed { .. } => StatusCode::BAD_REQUEST,

            Self::Unauthorized
            | Self::InvalidToken
            | Self::TokenExpired => StatusCode::UNAUTHORIZED,

            Self::Forbidden(_)
            | Self::PermissionDenied { .. } => StatusCode::FORBIDDEN,

            Self::NotFound(_) => StatusCode::NOT_FOUND,

            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,

            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,

            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,

            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling and metrics labels.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "validation_failed",
            Self::Unauthorized => "unauthorized",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::Forbidden(_) => "forbidden",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NotFound(_) => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::RequestTimeout => "request_timeout",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::TooManyRequests { .. } => "too_many_requests",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Authentication failure (no or bad credential).
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }

    /// Authorization failure for a known identity.
    pub fn is_forbidden(&self) -> bool {
        self.status_code() == StatusCode::FORBIDDEN
    }

    /// Check if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

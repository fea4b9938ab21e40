//! Error response implementation.

use super::types::ApiError;
use crate::store::StoreError;
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

/// Error envelope: `{"error": "...", "details": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Build the envelope for this error.
    pub fn to_body(&self) -> ErrorResponse {
        let (message, details) = match self {
            ApiError::ValidationFailed { fields, .. } if !fields.is_empty() => {
                (self.to_string(), Some(json!({ "fields": fields })))
            }
            ApiError::PermissionDenied { module, action } => (
                self.to_string(),
                Some(json!({ "module": module, "action": action })),
            ),
            ApiError::PayloadTooLarge { limit } => {
                (self.to_string(), Some(json!({ "limit": limit })))
            }
            ApiError::TooManyRequests { retry_after } => {
                (self.to_string(), Some(json!({ "retryAfter": retry_after })))
            }
            ApiError::Internal(err) => {
                // Don't expose collaborator failures in production
                let message = if cfg!(debug_assertions) {
                    format!("{}: {:#}", self, err)
                } else {
                    self.to_string()
                };
                (message, None)
            }
            _ => (self.to_string(), None),
        };

        ErrorResponse {
            error: message,
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!(
                error = ?self,
                code = self.error_code(),
                "Server error occurred"
            );
        } else if self.is_unauthorized() || self.is_forbidden() {
            warn!(
                error = %self,
                code = self.error_code(),
                "Auth error occurred"
            );
        }

        let mut response = (self.status_code(), Json(self.to_body())).into_response();

        if let ApiError::TooManyRequests { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

// Conversion implementations
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(anyhow::Error::new(err).context("store lookup failed"))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::TokenExpired,
            _ => ApiError::InvalidToken,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        ApiError::ValidationFailed {
            message: "request body is invalid".into(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_envelope_has_error_and_null_details() {
        let response = ApiError::forbidden("No active membership for this tenant").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["error"], "No active membership for this tenant");
        assert!(body["details"].is_null());
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = ApiError::TooManyRequests { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");

        let body = body_json(response).await;
        assert_eq!(body["details"]["retryAfter"], 42);
    }

    #[tokio::test]
    async fn test_permission_denied_details() {
        let response = ApiError::PermissionDenied {
            module: "payroll".into(),
            action: "view".into(),
        }
        .into_response();

        let body = body_json(response).await;
        assert_eq!(body["details"]["module"], "payroll");
        assert_eq!(body["details"]["action"], "view");
    }

    #[tokio::test]
    async fn test_payload_too_large_envelope() {
        let response = ApiError::PayloadTooLarge { limit: 16 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Request body exceeds 16 bytes");
        assert_eq!(body["details"]["limit"], 16);
    }

    #[test]
    fn test_store_error_becomes_internal() {
        let err: ApiError = StoreError::Unavailable("pool exhausted".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}

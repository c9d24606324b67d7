//! Error response formatting.
//!
//! Every failure leaves the service as the same JSON envelope: a
//! machine-readable code, a user-safe message, the request id and a retry
//! hint. Internal detail (SQL text, gateway bodies, secret names) stays in
//! the logs.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable, user-safe message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Optional additional details (e.g. the failing field)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            details: None,
            retryable: Some(error.is_retryable()),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        let mut body = ErrorResponse::from_app_error(&self);
        if let crate::error::AppErrorKind::Validation {
            field: Some(field), ..
        } = &self.kind
        {
            body = body.with_details(serde_json::json!({ "field": field }));
        }
        (status_code, Json(body)).into_response()
    }
}

/// Helper to extract the request ID set by the request-id layer.
pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppErrorKind;

    #[test]
    fn validation_error_carries_field_details() {
        let err = AppError::new(AppErrorKind::Validation {
            message: "aliasId is required".to_string(),
            field: Some("aliasId".to_string()),
        })
        .with_request_id("req-1");
        let body = ErrorResponse::from_app_error(&err);
        assert_eq!(body.error, ErrorCode::ValidationError);
        assert_eq!(body.request_id.as_deref(), Some("req-1"));
        assert_eq!(body.retryable, Some(false));
    }

    #[test]
    fn gateway_error_is_marked_retryable() {
        let err = AppError::new(AppErrorKind::Gateway {
            message: "timeout".to_string(),
            retryable: true,
        });
        let body = ErrorResponse::from_app_error(&err);
        assert_eq!(body.error, ErrorCode::GatewayError);
        assert_eq!(body.retryable, Some(true));
    }

    #[test]
    fn error_body_never_leaks_internal_detail() {
        let err = AppError::new(AppErrorKind::Database {
            message: "SELECT blew up: password=hunter2".to_string(),
            retryable: false,
        });
        let body = ErrorResponse::from_app_error(&err);
        assert!(!body.message.contains("hunter2"));
        assert!(!body.message.contains("SELECT"));
    }
}

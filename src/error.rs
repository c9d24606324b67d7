//! Unified error surface for the HTTP boundary.
//!
//! Module-level errors (payments, database, secrets) are folded into one
//! `AppError` with a stable machine-readable `ErrorCode`, an HTTP status and
//! a user-safe message. Secret values never appear in any variant.

use crate::database::error::DatabaseError;
use crate::payments::error::PaymentError;
use crate::secrets::SecretError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "PAYMENT_DECLINED")]
    PaymentDeclined,
    #[serde(rename = "GATEWAY_ERROR")]
    GatewayError,
    #[serde(rename = "SECRET_RESOLUTION_ERROR")]
    SecretResolutionError,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Validation {
        message: String,
        field: Option<String>,
    },
    OrderNotFound {
        order_id: String,
    },
    PaymentDeclined {
        status: u32,
        nc_error: Option<String>,
    },
    Gateway {
        message: String,
        retryable: bool,
    },
    Secrets {
        message: String,
    },
    Database {
        message: String,
        retryable: bool,
    },
    Configuration {
        message: String,
    },
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Validation { .. } => 400,
            AppErrorKind::OrderNotFound { .. } => 404,
            AppErrorKind::PaymentDeclined { .. } => 402,
            AppErrorKind::Gateway { .. } => 502,
            AppErrorKind::Secrets { .. } => 500,
            AppErrorKind::Database { .. } => 500,
            AppErrorKind::Configuration { .. } => 500,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => ErrorCode::ValidationError,
            AppErrorKind::OrderNotFound { .. } => ErrorCode::OrderNotFound,
            AppErrorKind::PaymentDeclined { .. } => ErrorCode::PaymentDeclined,
            AppErrorKind::Gateway { .. } => ErrorCode::GatewayError,
            AppErrorKind::Secrets { .. } => ErrorCode::SecretResolutionError,
            AppErrorKind::Database { .. } => ErrorCode::DatabaseError,
            AppErrorKind::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Validation { .. } => false,
            AppErrorKind::OrderNotFound { .. } => false,
            AppErrorKind::PaymentDeclined { .. } => false,
            AppErrorKind::Gateway { retryable, .. } => *retryable,
            AppErrorKind::Secrets { .. } => true,
            AppErrorKind::Database { retryable, .. } => *retryable,
            AppErrorKind::Configuration { .. } => false,
        }
    }

    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Validation { message, .. } => message.clone(),
            AppErrorKind::OrderNotFound { order_id } => {
                format!("No instruction found for order {}", order_id)
            }
            AppErrorKind::PaymentDeclined { status, .. } => {
                format!("Payment was declined by the gateway (status {})", status)
            }
            AppErrorKind::Gateway { .. } => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            AppErrorKind::Secrets { .. } => {
                "Could not resolve payment credentials. Please retry shortly".to_string()
            }
            AppErrorKind::Database { .. } => "A storage error occurred".to_string(),
            AppErrorKind::Configuration { .. } => "Service is misconfigured".to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let kind = match err {
            PaymentError::Declined { status, nc_error } => {
                AppErrorKind::PaymentDeclined { status, nc_error }
            }
            PaymentError::NetworkError { message } => AppErrorKind::Gateway {
                message,
                retryable: true,
            },
            PaymentError::MalformedResponse { message } => AppErrorKind::Gateway {
                message,
                retryable: true,
            },
        };
        AppError::new(kind)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::new(AppErrorKind::Database {
            message: err.message.clone(),
            retryable: err.is_retryable,
        })
    }
}

impl From<SecretError> for AppError {
    fn from(err: SecretError) -> Self {
        AppError::new(AppErrorKind::Secrets {
            message: err.to_string(),
        })
    }
}

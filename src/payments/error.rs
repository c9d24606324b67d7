use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Malformed gateway response: {message}")]
    MalformedResponse { message: String },

    #[error("Payment declined: gateway status {status}")]
    Declined {
        status: u32,
        nc_error: Option<String>,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::NetworkError { .. } => true,
            // The true gateway state is unknown, so the whole confirmation
            // call is safe to retry.
            PaymentError::MalformedResponse { .. } => true,
            PaymentError::Declined { .. } => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::NetworkError { .. } => 502,
            PaymentError::MalformedResponse { .. } => 502,
            PaymentError::Declined { .. } => 402,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::NetworkError { .. } => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            PaymentError::MalformedResponse { .. } => {
                "Payment gateway returned an unexpected response".to_string()
            }
            PaymentError::Declined { status, .. } => {
                format!("Payment was declined by the gateway (status {})", status)
            }
        }
    }
}

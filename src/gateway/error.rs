use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Gateway request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Payment not found at gateway: {payment_id}")]
    NotFound { payment_id: String },

    #[error("Gateway error: {message}")]
    Provider {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Invalid gateway response: {message}")]
    InvalidResponse { message: String },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network { .. } => true,
            GatewayError::Timeout { .. } => true,
            GatewayError::RateLimit { .. } => true,
            GatewayError::NotFound { .. } => false,
            GatewayError::Provider { retryable, .. } => *retryable,
            GatewayError::InvalidResponse { .. } => false,
        }
    }
}

impl From<GatewayError> for crate::error::AppError {
    fn from(err: GatewayError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError};

        let kind = match &err {
            GatewayError::Timeout { timeout_secs } => {
                AppErrorKind::External(ExternalError::Timeout {
                    timeout_secs: *timeout_secs,
                })
            }
            _ => AppErrorKind::External(ExternalError::Gateway {
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };
        AppError::new(kind)
    }
}

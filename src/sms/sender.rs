use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use crate::error::AppError;

/// Provider acknowledgement for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub sid: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("Invalid phone number format")]
    InvalidPhone,

    #[error("SMS service authentication failed")]
    Auth,

    #[error("Failed to send SMS: {0}")]
    Send(String),
}

impl From<SmsError> for AppError {
    fn from(err: SmsError) -> Self {
        match err {
            SmsError::InvalidPhone => AppError::Validation(err.to_string()),
            SmsError::Auth | SmsError::Send(_) => AppError::Upstream {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: err.to_string(),
                details: None,
            },
        }
    }
}

/// Outbound text messaging.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// `to` is already normalized to `+1XXXXXXXXXX`.
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage, SmsError>;
}

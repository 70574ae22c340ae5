use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Error returned by every handler. Each variant maps to one HTTP status.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    /// Duplicate data. Reported as a bad request, not 409.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Unavailable { message: String, details: Option<String> },

    #[error("{message}")]
    Timeout { message: String, details: Option<String> },

    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Option<String>,
    },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::NotConfigured(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Upstream { status, .. } => *status,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            AppError::Unavailable { details, .. }
            | AppError::Timeout { details, .. }
            | AppError::Upstream { details, .. } => details.clone(),
            AppError::Internal(e) => Some(format!("{e:#}")),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, details = ?self.details(), "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Timeout { message: "x".into(), details: None }.status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::NotConfigured("NOTION_TOKEN").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_configured_names_the_variable() {
        let err = AppError::NotConfigured("NOTION_DATABASE_ID");
        assert_eq!(err.to_string(), "NOTION_DATABASE_ID not configured");
    }

    #[test]
    fn internal_exposes_cause_as_details() {
        let err = AppError::Internal(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.details().as_deref(), Some("disk on fire"));
    }
}

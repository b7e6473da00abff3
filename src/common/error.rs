use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::common::response::ApiError;
use crate::modules::jobs::model::JobStatus;

/// Error taxonomy for the job API. Every kind maps to one HTTP status so
/// callers can handle each case instead of pattern-matching on message text.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("cannot delete a {0} job")]
    DeleteConflict(JobStatus),

    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnknownJobType(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::DeleteConflict(_) => StatusCode::CONFLICT,
            AppError::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Store failures carry driver details; keep those out of responses.
            AppError::Internal(e) => {
                error!("internal error: {:#}", e);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        ApiError(message, status).into_response()
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use super::types::ApiResponse;
use crate::core::client::queue::QueueError;

/// Result type of the job route handlers
pub type JobRouteResult = Result<Response, JobRouteError>;

/// Errors surfaced by the admission and status routes.
///
/// Each variant maps to one HTTP status with an [`ApiResponse::error`] body.
#[derive(Error, Debug)]
pub enum JobRouteError {
    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Invalid job id: {0}")]
    InvalidId(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job queue unavailable: {0}")]
    Unavailable(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),
}

impl From<QueueError> for JobRouteError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(id) => JobRouteError::NotFound(id.to_string()),
            e if e.is_unavailable() => JobRouteError::Unavailable(e.to_string()),
            e => JobRouteError::ProcessingError(e.to_string()),
        }
    }
}

impl JobRouteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JobRouteError::Unauthorized => StatusCode::UNAUTHORIZED,
            // Unknown and unparseable ids are indistinguishable to the caller
            JobRouteError::InvalidId(_) | JobRouteError::NotFound(_) => StatusCode::NOT_FOUND,
            JobRouteError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            JobRouteError::ProcessingError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for JobRouteError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

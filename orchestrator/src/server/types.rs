use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::types::JobState;

/// Represents a standardized API response structure.
///
/// Used for error bodies and for the health endpoint.
///
/// # Examples
/// ```
/// use orchestrator::server::types::ApiResponse;
/// let response = ApiResponse::error("Invalid job ID".to_string());
/// assert_eq!(response.success, false);
/// assert_eq!(response.message, Some("Invalid job ID".to_string()));
/// ```
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Optional message, typically used for error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self { success: false, data: None, message: Some(message) }
    }
}

impl<T> ApiResponse<T> {
    pub fn success_with_data(data: T, message: Option<String>) -> Self {
        Self { success: true, data: Some(data), message }
    }

    pub fn success(message: Option<String>) -> Self {
        Self { success: true, data: None, message }
    }
}

/// Body of `POST /generate-proof`. The input is stored verbatim.
#[derive(Deserialize, Debug)]
pub struct GenerateProofRequest {
    #[serde(default)]
    pub input: Value,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateProofResponse {
    pub job_id: Uuid,
    pub message: String,
}

/// Body of `GET /job-status/:job_id`
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobItem> for JobStatusResponse {
    fn from(job: JobItem) -> Self {
        Self { job_id: job.id, status: job.state, result: job.result, error: job.error }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub broker_ready: bool,
    pub queue_healthy: bool,
}

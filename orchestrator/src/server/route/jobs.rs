use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::super::error::{JobRouteError, JobRouteResult};
use super::super::middleware::require_api_key;
use super::super::types::{GenerateProofRequest, GenerateProofResponse, JobStatusResponse};
use crate::core::config::Config;
use crate::types::jobs::types::JobState;
use crate::utils::metrics::ORCHESTRATOR_METRICS;

/// Handles proof generation requests.
///
/// Admits the input as a new `queued` job and answers `202 Accepted` with its id. The proof
/// itself is produced later by a worker and read back through the status route.
///
/// # Errors
/// * `JobRouteError::Unavailable` - If the queue cannot be reached
/// * `JobRouteError::ProcessingError` - If the job could not be persisted
#[instrument(skip(config, request))]
async fn handle_generate_proof_request(
    State(config): State<Arc<Config>>,
    Json(request): Json<GenerateProofRequest>,
) -> JobRouteResult {
    match config.queue().enqueue(request.input).await {
        Ok(job_id) => {
            info!(job_id = %job_id, "Proof generation job queued");
            ORCHESTRATOR_METRICS.jobs_enqueued.add(1, &[]);
            let body =
                GenerateProofResponse { job_id, message: "Proof generation job queued".to_string() };
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
        Err(e) => {
            error!(error = %e, "Failed to queue proof generation job");
            Err(e.into())
        }
    }
}

/// Reports the current state of a job.
///
/// | state | status |
/// |---|---|
/// | completed | 200 with `result` |
/// | queued, active | 202 |
/// | failed | 500 with `error` |
/// | unknown id | 404 |
#[instrument(skip(config), fields(job_id = %id))]
async fn handle_job_status_request(Path(id): Path<String>, State(config): State<Arc<Config>>) -> JobRouteResult {
    let job_id = Uuid::parse_str(&id).map_err(|_| JobRouteError::InvalidId(id.clone()))?;

    let job = config.queue().get_status(job_id).await.map_err(|e| {
        error!(error = %e, "Failed to fetch job status");
        JobRouteError::from(e)
    })?;

    let status = match job.state {
        JobState::Completed => StatusCode::OK,
        JobState::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        JobState::Queued | JobState::Active => StatusCode::ACCEPTED,
    };
    Ok((status, Json(JobStatusResponse::from(job))).into_response())
}

/// Routes for job admission and status, all behind the API key check
pub fn job_router(config: Arc<Config>) -> Router {
    Router::new()
        .route("/generate-proof", post(handle_generate_proof_request))
        .route("/job-status/:job_id", get(handle_job_status_request))
        .route_layer(from_fn_with_state(config.clone(), require_api_key))
        .with_state(config)
}

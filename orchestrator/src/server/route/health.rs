use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

use super::super::types::{ApiResponse, HealthResponse};
use crate::core::config::Config;

/// Readiness probe. Answers 503 while the broker is unreachable or the queue is closed.
async fn handle_health_request(State(config): State<Arc<Config>>) -> impl IntoResponse {
    let broker_ready = config.broker_ready();
    let queue_healthy = match config.queue().health_check().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Queue health check failed");
            false
        }
    };

    let health = HealthResponse { broker_ready, queue_healthy };
    if broker_ready && queue_healthy {
        (StatusCode::OK, Json(ApiResponse::success_with_data(health, None)))
    } else {
        let body = ApiResponse { success: false, data: Some(health), message: Some("Service unavailable".to_string()) };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

pub fn health_router(config: Arc<Config>) -> Router {
    Router::new().route("/health", get(handle_health_request)).with_state(config)
}

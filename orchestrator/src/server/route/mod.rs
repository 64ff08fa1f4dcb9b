use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};

use super::types::ApiResponse;
use crate::core::config::Config;

pub(super) mod health;
pub(super) mod jobs;

/// Fallback for every path no route matches
pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("The requested resource was not found".to_string())))
}

pub(crate) fn server_router(config: Arc<Config>) -> Router {
    Router::new()
        .merge(jobs::job_router(config.clone()))
        .merge(health::health_router(config))
        .fallback(handler_404)
}

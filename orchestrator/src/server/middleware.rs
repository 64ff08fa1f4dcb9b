use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use super::error::JobRouteError;
use crate::core::config::Config;
use crate::types::constant::API_KEY_HEADER;

/// Rejects requests whose `X-API-Key` header does not match the configured key.
///
/// Without a configured key every request is rejected. Rejected requests never reach the queue.
pub async fn require_api_key(
    State(config): State<Arc<Config>>,
    request: Request,
    next: Next,
) -> Result<Response, JobRouteError> {
    let provided = request.headers().get(API_KEY_HEADER).and_then(|value| value.to_str().ok());

    match (config.server_config().api_key.as_deref(), provided) {
        (Some(expected), Some(provided)) if keys_match(expected, provided) => Ok(next.run(request).await),
        _ => {
            warn!(path = %request.uri().path(), "Rejected request with missing or invalid API key");
            Err(JobRouteError::Unauthorized)
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn keys_match(expected: &str, provided: &str) -> bool {
    let (expected, provided) = (expected.as_bytes(), provided.as_bytes());
    expected.len() == provided.len() && expected.iter().zip(provided).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

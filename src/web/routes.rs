//! Route handlers.

use axum::extract::State;
use axum::http::Uri;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Serialize;
use serde_json::{json, Value};

use super::middleware::RequestId;
use super::response::ApiError;
use super::AppState;
use crate::ratelimit::LimiterKind;

/// Snapshot of the limiter returned by `GET /api/v1/limiter`.
#[derive(Debug, Serialize)]
pub struct LimiterStatus {
    pub strategy: LimiterKind,
    pub limit: u32,
    pub window_secs: u64,
    pub tracked_keys: usize,
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/v1/limiter
pub async fn limiter_status(
    State(state): State<AppState>,
) -> Result<Json<LimiterStatus>, ApiError> {
    let limiter = state
        .rate_limiter
        .as_ref()
        .ok_or(ApiError::RateLimitDisabled)?;

    Ok(Json(LimiterStatus {
        strategy: limiter.kind(),
        limit: limiter.limit(),
        window_secs: limiter.window().as_secs(),
        tracked_keys: limiter.tracked_keys(),
    }))
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri, request_id: Option<Extension<RequestId>>) -> Response {
    let request_id = request_id.map(|Extension(id)| id);
    ApiError::RouteNotFound(uri.path().to_string()).with_request_id(request_id.as_ref())
}

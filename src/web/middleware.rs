//! Request identity, request logging and rate limiting middleware.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::response::ApiError;
use super::AppState;
use crate::ratelimit::RequestContext;

/// Header carrying the request id in both directions.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Identifier of the current request, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Resolve the client address used as the rate limit key.
///
/// Prefers the first hop of `X-Forwarded-For`, then `X-Real-IP`, then the
/// TCP peer address. Falls back to `"unknown"` so every request still maps
/// to some key.
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Attach a [`RequestId`] and a [`RequestContext`] to every request.
///
/// An incoming `X-Request-ID` is reused; otherwise a new UUID is generated.
/// The id is echoed on the response. A context already present on the
/// request is left in place.
pub async fn request_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let extensions = request.extensions_mut();
    extensions.insert(RequestId(request_id.clone()));
    if extensions.get::<RequestContext>().is_none() {
        extensions.insert(RequestContext::with_timeout(state.request_timeout));
    }

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// Log one `http_request` line per request once the response is ready.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let remote_ip = client_ip(&request);
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        remote_ip = %remote_ip,
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        "http_request"
    );

    response
}

/// Reject requests over the client's quota with `429 Too Many Requests`.
///
/// A request whose context is already cancelled or expired is rejected the
/// same way.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };

    let key = client_ip(&request);
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    if limiter.allow_context(&ctx, &key) {
        return next.run(request).await;
    }

    let request_id = request.extensions().get::<RequestId>();
    warn!(
        ip = %key,
        request_id = request_id.map(|id| id.0.as_str()).unwrap_or_default(),
        "rate_limit_exceeded"
    );

    ApiError::RateLimitExceeded.with_request_id(request_id)
}

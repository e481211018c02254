//! HTTP surface: router, middleware and server.

mod middleware;
mod response;
mod routes;
mod server;

pub use middleware::{client_ip, RequestId, X_REQUEST_ID};
pub use response::{ApiError, ErrorResponse};
pub use routes::LimiterStatus;
pub use server::HttpServer;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::ratelimit::RateLimiter;

/// State shared by every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    /// The configured limiter, or `None` when rate limiting is disabled
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,
    /// Deadline attached to each request's [`RequestContext`](crate::ratelimit::RequestContext)
    pub request_timeout: Duration,
}

impl AppState {
    /// Create state around an optional limiter.
    pub fn new(rate_limiter: Option<Arc<dyn RateLimiter>>, request_timeout: Duration) -> Self {
        Self {
            rate_limiter,
            request_timeout,
        }
    }
}

/// Build the application router.
///
/// Requests pass through, outermost first: request id and context, request
/// logging, rate limiting (only when a limiter is configured), then routing.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/limiter", get(routes::limiter_status))
        .fallback(routes::not_found);

    if state.rate_limiter.is_some() {
        app = app.layer(from_fn_with_state(state.clone(), middleware::rate_limit));
    }

    app.layer(from_fn(middleware::request_logger))
        .layer(from_fn_with_state(state.clone(), middleware::request_context))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{RequestContext, SlidingWindowLimiter, TokenBucketLimiter};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    const WINDOW: Duration = Duration::from_secs(60);

    fn app_with(limiter: Option<Arc<dyn RateLimiter>>) -> Router {
        router(AppState::new(limiter, Duration::from_secs(30)))
    }

    fn get_from(path: &str, ip: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_without_limiter() {
        let app = app_with(None);

        let response = app.oneshot(get_from("/health", "10.0.0.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_echoed() {
        let app = app_with(None);
        let request = Request::builder()
            .uri("/health")
            .header(X_REQUEST_ID, "req-123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], "req-123");
    }

    #[tokio::test]
    async fn test_requests_over_limit_get_429() {
        let limiter: Arc<dyn RateLimiter> = Arc::new(SlidingWindowLimiter::new(2, WINDOW).unwrap());
        let app = app_with(Some(Arc::clone(&limiter)));

        for _ in 0..2 {
            let response = app.clone().oneshot(get_from("/health", "10.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let request = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "10.0.0.1")
            .header(X_REQUEST_ID, "req-429")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = json_body(response).await;
        assert_eq!(body["status"], 429);
        assert_eq!(body["error_code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(body["message"], "Too many requests. Please try again later.");
        assert_eq!(body["request_id"], "req-429");

        // Another client still has its full quota.
        let response = app.oneshot(get_from("/health", "10.0.0.2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        limiter.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_routes_are_rate_limited_too() {
        let limiter: Arc<dyn RateLimiter> = Arc::new(TokenBucketLimiter::new(1, WINDOW).unwrap());
        let app = app_with(Some(limiter));

        let response = app.clone().oneshot(get_from("/missing", "10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error_code"], "ROUTE_NOT_FOUND");

        let response = app.oneshot(get_from("/missing", "10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_denied_without_recording() {
        let limiter: Arc<dyn RateLimiter> = Arc::new(SlidingWindowLimiter::new(5, WINDOW).unwrap());
        let app = app_with(Some(Arc::clone(&limiter)));

        let ctx = RequestContext::new();
        ctx.cancel();
        let mut request = get_from("/health", "10.0.0.1");
        request.extensions_mut().insert(ctx);

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_limiter_status() {
        let limiter: Arc<dyn RateLimiter> = Arc::new(TokenBucketLimiter::new(10, WINDOW).unwrap());
        let app = app_with(Some(limiter));

        app.clone().oneshot(get_from("/health", "10.0.0.1")).await.unwrap();
        let response = app.oneshot(get_from("/api/v1/limiter", "10.0.0.2")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["strategy"], "token-bucket");
        assert_eq!(body["limit"], 10);
        assert_eq!(body["window_secs"], 60);
        assert_eq!(body["tracked_keys"], 2);
    }

    #[tokio::test]
    async fn test_limiter_status_when_disabled() {
        let app = app_with(None);

        let response = app.oneshot(get_from("/api/v1/limiter", "10.0.0.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error_code"], "RATE_LIMIT_DISABLED");
    }
}

//! JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use super::middleware::RequestId;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The client has used up its quota for the current window
    #[error("Too many requests. Please try again later.")]
    RateLimitExceeded,

    /// No limiter is configured
    #[error("Rate limiting is disabled")]
    RateLimitDisabled,

    /// No route matches the request path
    #[error("Route {0} not found")]
    RouteNotFound(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::RateLimitDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RouteNotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ApiError::RateLimitDisabled => "RATE_LIMIT_DISABLED",
            ApiError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
        }
    }

    /// Render the error, tagging the body with the request id when known.
    pub fn with_request_id(self, request_id: Option<&RequestId>) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            status: status.as_u16(),
            error_code: self.code(),
            message: self.to_string(),
            request_id: request_id.map(|id| id.0.clone()),
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.with_request_id(None)
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// HTTP status code, repeated in the body
    pub status: u16,
    /// Machine-readable code such as `RATE_LIMIT_EXCEEDED`
    pub error_code: &'static str,
    /// Human-readable description
    pub message: String,
    /// Id of the failed request, when one was assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

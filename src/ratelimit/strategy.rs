//! Strategy selection and limiter construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::backend::RateLimiter;
use super::sliding_window::SlidingWindowLimiter;
use super::token_bucket::TokenBucketLimiter;
use crate::error::{Result, TurnstileError};

/// The available rate limiting strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LimiterKind {
    /// Per-key token count refilled in lockstep on a shared timer.
    TokenBucket,
    /// Exact count of admissions in the trailing window.
    #[default]
    SlidingWindow,
}

impl LimiterKind {
    /// The configuration name of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterKind::TokenBucket => "token-bucket",
            LimiterKind::SlidingWindow => "sliding-window",
        }
    }
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimiterKind {
    type Err = TurnstileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token-bucket" | "token_bucket" => Ok(LimiterKind::TokenBucket),
            "sliding-window" | "sliding_window" => Ok(LimiterKind::SlidingWindow),
            other => Err(TurnstileError::Config(format!(
                "unknown limiter type '{}', expected 'token-bucket' or 'sliding-window'",
                other
            ))),
        }
    }
}

/// Quota parameters for constructing a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSpec {
    /// Which strategy to build
    pub kind: LimiterKind,
    /// Maximum admitted requests per window
    pub limit: u32,
    /// Accounting window
    pub window: Duration,
}

/// Reject quotas that could never admit anything or would tick continuously.
pub(crate) fn validate_quota(limit: u32, window: Duration) -> Result<()> {
    if limit == 0 {
        return Err(TurnstileError::Config(
            "rate limit must be greater than zero".to_string(),
        ));
    }
    if window.is_zero() {
        return Err(TurnstileError::Config(
            "rate limit window must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Build the limiter described by `spec`.
///
/// Must be called from within a tokio runtime, since the limiter spawns its
/// background task immediately.
pub fn build_limiter(spec: LimiterSpec) -> Result<Arc<dyn RateLimiter>> {
    let limiter: Arc<dyn RateLimiter> = match spec.kind {
        LimiterKind::TokenBucket => Arc::new(TokenBucketLimiter::new(spec.limit, spec.window)?),
        LimiterKind::SlidingWindow => {
            Arc::new(SlidingWindowLimiter::new(spec.limit, spec.window)?)
        }
    };

    info!(
        strategy = %spec.kind,
        limit = spec.limit,
        window = ?spec.window,
        "Rate limiter initialized"
    );

    Ok(limiter)
}

//! Rate limiter trait shared by the token-bucket and sliding-window strategies.

use async_trait::async_trait;
use std::time::Duration;

use super::context::RequestContext;
use super::strategy::LimiterKind;
use crate::error::Result;

/// Trait for rate limiter implementations.
///
/// This trait abstracts over [`TokenBucketLimiter`](super::TokenBucketLimiter)
/// and [`SlidingWindowLimiter`](super::SlidingWindowLimiter) so the HTTP layer
/// can hold either behind an `Arc<dyn RateLimiter>`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Decide whether a request for `key` is admitted now.
    ///
    /// An admitted request is recorded against the key. Never blocks beyond
    /// briefly acquiring the key map lock.
    fn allow(&self, key: &str) -> bool;

    /// Like [`RateLimiter::allow`], but denies without touching any state if
    /// `ctx` is already cancelled or expired.
    fn allow_context(&self, ctx: &RequestContext, key: &str) -> bool {
        if ctx.is_done() {
            return false;
        }
        self.allow(key)
    }

    /// Forget every key.
    fn reset(&self);

    /// Stop the background refill/cleanup task.
    ///
    /// Waits for an in-flight tick to complete. Calling this twice returns
    /// [`TurnstileError::AlreadyClosed`](crate::error::TurnstileError::AlreadyClosed).
    async fn close(&self) -> Result<()>;

    /// Number of keys currently tracked.
    fn tracked_keys(&self) -> usize;

    /// Which strategy this limiter implements.
    fn kind(&self) -> LimiterKind;

    /// Maximum admitted requests per window.
    fn limit(&self) -> u32;

    /// Length of the accounting window.
    fn window(&self) -> Duration;
}

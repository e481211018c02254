//! Token bucket limiter with a synchronized global refill.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::backend::RateLimiter;
use super::strategy::{validate_quota, LimiterKind};
use super::ticker::Ticker;
use crate::error::Result;

/// Remaining allowance for a single key.
#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    /// Tokens left until the next refill, `0..=rate`
    tokens: u32,
    /// When this bucket was created or last refilled
    last_refill: Instant,
}

type Buckets = Arc<Mutex<HashMap<String, TokenBucket>>>;

/// A per-key token bucket refilled in lockstep.
///
/// Every `window`, a single background tick sets the token count of **every**
/// known key back to `rate`, regardless of when each key first appeared. This
/// is cheaper than per-key elapsed-time refill but coarser: right after a
/// refill boundary each active key can burst up to `rate` requests. Use
/// [`SlidingWindowLimiter`](super::SlidingWindowLimiter) when the trailing
/// count must never exceed the limit.
///
/// Keys are never removed individually; only [`RateLimiter::reset`] forgets
/// them.
pub struct TokenBucketLimiter {
    buckets: Buckets,
    rate: u32,
    window: Duration,
    ticker: Ticker,
}

impl TokenBucketLimiter {
    /// Create a limiter admitting `rate` requests per key per `window`.
    ///
    /// Spawns the refill task on the current tokio runtime and fails if
    /// there is none.
    pub fn new(rate: u32, window: Duration) -> Result<Self> {
        validate_quota(rate, window)?;

        let buckets: Buckets = Arc::new(Mutex::new(HashMap::new()));
        let refill_target = Arc::clone(&buckets);
        let ticker = Ticker::spawn("token-bucket-refill", window, move || {
            refill_all(&refill_target, rate);
        })?;

        Ok(Self {
            buckets,
            rate,
            window,
            ticker,
        })
    }

    /// Tokens remaining for `key`, or `None` if the key has not been seen.
    pub fn tokens(&self, key: &str) -> Option<u32> {
        self.buckets.lock().get(key).map(|bucket| bucket.tokens)
    }

    /// When `key` was created or last refilled.
    pub fn last_refill(&self, key: &str) -> Option<Instant> {
        self.buckets.lock().get(key).map(|bucket| bucket.last_refill)
    }

    /// Refill every bucket now, as the background tick does.
    pub fn refill(&self) {
        refill_all(&self.buckets, self.rate);
    }
}

fn refill_all(buckets: &Mutex<HashMap<String, TokenBucket>>, rate: u32) {
    let mut buckets = buckets.lock();
    let now = Instant::now();
    for bucket in buckets.values_mut() {
        bucket.tokens = rate;
        bucket.last_refill = now;
    }
    debug!(keys = buckets.len(), tokens = rate, "Refilled token buckets");
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    fn allow(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock();

        let Some(bucket) = buckets.get_mut(key) else {
            // First contact spends one token.
            trace!(key = %key, tokens = self.rate - 1, "Creating token bucket");
            buckets.insert(
                key.to_string(),
                TokenBucket {
                    tokens: self.rate - 1,
                    last_refill: Instant::now(),
                },
            );
            return true;
        };

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            trace!(key = %key, "Token bucket exhausted");
            false
        }
    }

    fn reset(&self) {
        self.buckets.lock().clear();
    }

    async fn close(&self) -> Result<()> {
        self.ticker.stop().await?;
        self.buckets.lock().clear();
        Ok(())
    }

    fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }

    fn kind(&self) -> LimiterKind {
        LimiterKind::TokenBucket
    }

    fn limit(&self) -> u32 {
        self.rate
    }

    fn window(&self) -> Duration {
        self.window
    }
}

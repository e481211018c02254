//! Sliding window limiter with exact trailing-window counts.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::backend::RateLimiter;
use super::strategy::{validate_quota, LimiterKind};
use super::ticker::Ticker;
use crate::error::Result;

type Windows = Arc<Mutex<HashMap<String, VecDeque<Instant>>>>;

/// Limits each key to `limit` admissions in any trailing `window`.
///
/// Every key keeps the instants of its admitted requests in arrival order.
/// Rejected attempts are not recorded. A background sweep every `window`
/// drops expired instants and forgets keys with none left.
pub struct SlidingWindowLimiter {
    windows: Windows,
    limit: u32,
    window: Duration,
    ticker: Ticker,
}

impl SlidingWindowLimiter {
    /// Create a limiter admitting `limit` requests per key in any `window`.
    ///
    /// Spawns the cleanup task on the current tokio runtime and fails if
    /// there is none.
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        validate_quota(limit, window)?;

        let windows: Windows = Arc::new(Mutex::new(HashMap::new()));
        let cleanup_target = Arc::clone(&windows);
        let ticker = Ticker::spawn("sliding-window-cleanup", window, move || {
            sweep(&cleanup_target, window);
        })?;

        Ok(Self {
            windows,
            limit,
            window,
            ticker,
        })
    }

    /// Number of stored request instants for `key`, including any that have
    /// expired but not yet been pruned.
    pub fn request_count(&self, key: &str) -> usize {
        self.windows.lock().get(key).map_or(0, VecDeque::len)
    }

    /// Prune every key now, as the background sweep does.
    pub fn cleanup(&self) {
        sweep(&self.windows, self.window);
    }
}

/// Drop instants that are not strictly inside `(now - window, now]`.
///
/// Instants are stored in arrival order, so expired ones sit at the front.
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = timestamps.front() {
        if now.saturating_duration_since(oldest) < window {
            break;
        }
        timestamps.pop_front();
    }
}

fn sweep(windows: &Mutex<HashMap<String, VecDeque<Instant>>>, window: Duration) {
    let mut windows = windows.lock();
    let now = Instant::now();
    let before = windows.len();

    windows.retain(|_, timestamps| {
        prune(timestamps, now, window);
        !timestamps.is_empty()
    });

    debug!(
        removed = before - windows.len(),
        remaining = windows.len(),
        "Swept idle rate limit windows"
    );
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    fn allow(&self, key: &str) -> bool {
        let mut windows = self.windows.lock();
        // Taken under the lock so instants stay ordered per key.
        let now = Instant::now();

        match windows.get_mut(key) {
            Some(timestamps) => {
                prune(timestamps, now, self.window);

                if timestamps.len() >= self.limit as usize {
                    trace!(key = %key, count = timestamps.len(), "Sliding window full");
                    return false;
                }

                timestamps.push_back(now);
                true
            }
            None => {
                // The limit is at least one, so a new key is always admitted.
                windows.insert(key.to_string(), VecDeque::from([now]));
                true
            }
        }
    }

    fn reset(&self) {
        self.windows.lock().clear();
    }

    async fn close(&self) -> Result<()> {
        self.ticker.stop().await?;
        self.windows.lock().clear();
        Ok(())
    }

    fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }

    fn kind(&self) -> LimiterKind {
        LimiterKind::SlidingWindow
    }

    fn limit(&self) -> u32 {
        self.limit
    }

    fn window(&self) -> Duration {
        self.window
    }
}

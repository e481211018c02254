//! Per-request cancellation state consulted before a rate limit decision.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline information carried with a request.
///
/// A context is "done" once its token is cancelled or its deadline has passed.
/// Limiters treat a done context as a denial without touching any key state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Create a context that is never done unless cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Create a context driven by an existing cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the context has been cancelled or has expired.
    pub fn is_done(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_not_done() {
        let ctx = RequestContext::new();
        assert!(!ctx.is_done());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_cancel_propagates_to_clones() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();

        ctx.cancel();

        assert!(ctx.is_done());
        assert!(clone.is_done());
    }

    #[test]
    fn test_external_token() {
        let token = CancellationToken::new();
        let ctx = RequestContext::with_token(token.child_token());
        assert!(!ctx.is_done());

        token.cancel();
        assert!(ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(100));
        assert!(!ctx.is_done());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(ctx.is_done());
    }
}

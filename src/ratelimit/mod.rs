//! Rate limiting strategies and their shared contract.

mod backend;
mod context;
mod sliding_window;
mod strategy;
mod ticker;
mod token_bucket;

pub use backend::RateLimiter;
pub use context::RequestContext;
pub use sliding_window::SlidingWindowLimiter;
pub use strategy::{build_limiter, LimiterKind, LimiterSpec};
pub use token_bucket::TokenBucketLimiter;

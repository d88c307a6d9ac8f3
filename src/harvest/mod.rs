//! Rate-limited, retrying batch fetcher.
//!
//! - [`RateLimiter`]: one run-wide pacer shared by every task.
//! - [`RetryPolicy`]: attempt bound and backoff by failure class.
//! - [`HarvestEngine`]: semaphore-bounded dispatch, cache-first lookups,
//!   per-identifier retry loop, aggregated [`FetchReport`].

mod engine;
mod rate_limiter;
mod retry;

pub use engine::{EngineError, FetchOutcome, FetchReport, FetchStats, HarvestEngine};
pub use rate_limiter::{RateLimiter, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_RETRY_DELAY, DEFAULT_RETRY_DELAY, FailureType,
    RetryDecision, RetryPolicy, classify_error,
};

//! Retry classification and backoff for failed fetch attempts.
//!
//! A failed attempt is classified into a [`FailureType`], and
//! [`RetryPolicy::should_retry`] turns (failure type, attempt number) into a
//! [`RetryDecision`]. The backoff itself, [`RetryPolicy::backoff_delay`], is a
//! pure function of the attempt number and the failure type:
//!
//! | Failure | Delay after attempt `n` (0-based) |
//! |---------|-----------------------------------|
//! | `RateLimited` | `base_delay * 2^n` |
//! | `Transient` | `base_delay * (n + 1)` |
//! | `Permanent` | not retried |
//!
//! Delays are capped at `max_delay`; optional jitter is added on top.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use harvester_core::fetch::FetchError;
//! use harvester_core::harvest::{classify_error, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(5));
//! let error = FetchError::rate_limited("15858239");
//!
//! match policy.should_retry(classify_error(&error), 0) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(5));
//!         assert_eq!(attempt, 1);
//!     }
//!     RetryDecision::DoNotRetry { .. } => unreachable!(),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::fetch::FetchError;

/// Default total attempts per identifier.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base backoff unit.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default cap on a single backoff delay (5 minutes).
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Provider asked us to slow down. Exponential backoff.
    RateLimited,

    /// No valid answer exists for the identifier. Never retried.
    Permanent,

    /// Unclassified or transport failure. Linear backoff.
    Transient,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// Index of the next attempt (0-based, so the first retry is 1).
        attempt: u32,
    },

    /// Stop; the identifier has failed for this run.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry bound and backoff parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    max_attempts: u32,

    /// Backoff unit.
    base_delay: Duration,

    /// Cap on a single delay.
    max_delay: Duration,

    /// Upper bound of random jitter added to each delay.
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Creates a policy with no jitter and the default delay cap.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: DEFAULT_MAX_RETRY_DELAY,
            jitter: Duration::ZERO,
        }
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the jitter bound.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the total attempt bound.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff unit.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Backoff after the failed attempt `attempt` (0-based), without jitter.
    ///
    /// Returns `None` for [`FailureType::Permanent`].
    #[must_use]
    pub fn backoff_delay(&self, failure_type: FailureType, attempt: u32) -> Option<Duration> {
        let delay = match failure_type {
            FailureType::Permanent => return None,
            FailureType::RateLimited => 2u32
                .checked_pow(attempt)
                .and_then(|factor| self.base_delay.checked_mul(factor))
                .unwrap_or(self.max_delay),
            FailureType::Transient => attempt
                .checked_add(1)
                .and_then(|factor| self.base_delay.checked_mul(factor))
                .unwrap_or(self.max_delay),
        };
        Some(delay.min(self.max_delay))
    }

    /// Decides what to do after attempt `attempt` (0-based) failed.
    #[must_use]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        let Some(delay) = self.backoff_delay(failure_type, attempt) else {
            return RetryDecision::DoNotRetry {
                reason: "no valid answer exists - retry would not help".to_string(),
            };
        };

        let next = attempt.saturating_add(1);
        if next >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = delay + self.sample_jitter();
        debug!(attempt, next_attempt = next, delay_ms = delay.as_millis(), "will retry");
        RetryDecision::Retry {
            delay,
            attempt: next,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn sample_jitter(&self) -> Duration {
        let bound = self.jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=bound))
    }
}

/// Classifies a fetch error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | `RateLimited` | `RateLimited` |
/// | `ClientError` | `Permanent` |
/// | `Unexpected` | `Transient` |
#[must_use]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::RateLimited { .. } => FailureType::RateLimited,
        FetchError::ClientError { .. } => FailureType::Permanent,
        FetchError::Unexpected { .. } => FailureType::Transient,
    }
}

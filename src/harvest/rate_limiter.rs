//! Global request pacing.
//!
//! [`RateLimiter`] keeps one last-request timestamp shared by every fetch
//! task, so the run-wide request rate never exceeds the configured limit no
//! matter how many concurrency slots are active.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use harvester_core::harvest::RateLimiter;
//!
//! # async fn example() {
//! // At most 3 requests per second across all tasks.
//! let limiter = Arc::new(RateLimiter::new(3.0));
//!
//! // First request proceeds immediately
//! limiter.acquire().await;
//!
//! // Second request waits ~333ms
//! limiter.acquire().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Warning threshold for cumulative pacing delay (30 seconds).
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After value (1 hour) to prevent excessive delays.
pub(crate) const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Run-wide request pacer.
///
/// Designed to be wrapped in `Arc` and shared across spawned Tokio tasks.
/// The async mutex around the last-request timestamp is held across the
/// pacing sleep, which serializes dispatch at the configured interval.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two requests.
    min_interval: Duration,

    /// Whether pacing is disabled (`rate_limit == 0`).
    disabled: bool,

    /// Time of the last dispatched request. `None` until the first request.
    last_request: Mutex<Option<Instant>>,

    /// Provider-imposed pause (from Retry-After). Checked by every `acquire`.
    hold_until: StdMutex<Option<Instant>>,

    /// Cumulative time spent waiting in `acquire`, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl RateLimiter {
    /// Creates a pacer allowing at most `requests_per_second` requests.
    ///
    /// A rate of zero (or any non-positive / non-finite value) disables
    /// pacing.
    #[must_use]
    #[instrument]
    pub fn new(requests_per_second: f64) -> Self {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Self::disabled();
        }
        let interval = Duration::try_from_secs_f64(1.0 / requests_per_second)
            .unwrap_or(MAX_RETRY_AFTER)
            .min(MAX_RETRY_AFTER);
        Self::from_interval(interval)
    }

    /// Creates a pacer with an explicit minimum interval between requests.
    #[must_use]
    pub fn from_interval(min_interval: Duration) -> Self {
        debug!(interval_ms = min_interval.as_millis(), "creating rate limiter");
        Self {
            min_interval,
            disabled: false,
            last_request: Mutex::new(None),
            hold_until: StdMutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a disabled pacer that applies no delays.
    #[must_use]
    pub fn disabled() -> Self {
        debug!("creating disabled rate limiter");
        Self {
            min_interval: Duration::ZERO,
            disabled: true,
            last_request: Mutex::new(None),
            hold_until: StdMutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the minimum interval between requests.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Returns the total delay imposed so far.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Waits until the next request may be dispatched, then claims the slot.
    ///
    /// The first request proceeds immediately unless a provider pause is
    /// active.
    #[instrument(skip(self))]
    pub async fn acquire(&self) {
        if self.disabled {
            return;
        }

        let mut last_request = self.last_request.lock().await;

        // A provider pause can be recorded while we sleep; re-check until clear.
        loop {
            let now = Instant::now();
            let mut ready_at = last_request.map_or(now, |last| last + self.min_interval);
            if let Some(hold) = self.hold() {
                ready_at = ready_at.max(hold);
            }
            if ready_at <= now {
                break;
            }

            let delay = ready_at - now;
            let cumulative = self.add_cumulative_delay(delay);
            debug!(
                delay_ms = delay.as_millis(),
                cumulative_ms = cumulative.as_millis(),
                "applying rate limit delay"
            );
            if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD
                && cumulative - delay < CUMULATIVE_DELAY_WARNING_THRESHOLD
            {
                warn!(
                    cumulative_delay_secs = cumulative.as_secs(),
                    "excessive rate limiting - consider lowering the request rate"
                );
            }
            tokio::time::sleep_until(ready_at).await;
        }

        *last_request = Some(Instant::now());
    }

    /// Records a provider-mandated pause (from a Retry-After header).
    ///
    /// No request is dispatched through this pacer until `delay` has
    /// elapsed. Shorter pauses never shorten a longer one already active.
    #[instrument(skip(self))]
    pub fn record_rate_limit(&self, delay: Duration) {
        let until = Instant::now() + delay.min(MAX_RETRY_AFTER);
        {
            let mut hold = self
                .hold_until
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *hold = Some(hold.map_or(until, |current| current.max(until)));
        }

        debug!(delay_ms = delay.as_millis(), "recorded provider rate limit");
    }

    fn hold(&self) -> Option<Instant> {
        *self
            .hold_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports integer seconds (`120`) and HTTP-dates
/// (`Wed, 21 Oct 2025 07:28:00 GMT`). Returns `None` if the value cannot be
/// parsed. Values above one hour are capped.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use harvester_core::harvest::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(cap_retry_after(duration));
    }

    match httpdate::parse_http_date(header_value) {
        Ok(datetime) => Some(
            datetime
                .duration_since(std::time::SystemTime::now())
                .map_or(Duration::ZERO, cap_retry_after),
        ),
        Err(_) => {
            debug!(header_value, "unparseable Retry-After value");
            None
        }
    }
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        MAX_RETRY_AFTER
    } else {
        duration
    }
}

//! Run configuration and on-disk data layout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::collector::SourceGroup;
use crate::harvest::{DEFAULT_MAX_RETRY_DELAY, RateLimiter, RetryPolicy};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default identifiers per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default request rate (requests per second).
pub const DEFAULT_RATE_LIMIT: f64 = 10.0;

/// Default concurrency bound.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Conservative preset used by the retry pass.
const CONSERVATIVE_BATCH_SIZE: usize = 10;
const CONSERVATIVE_RATE_LIMIT: f64 = 3.0;
const CONSERVATIVE_MAX_CONCURRENCY: usize = 5;
const CONSERVATIVE_MAX_RETRIES: u32 = 5;
const CONSERVATIVE_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Errors raised by [`FetcherConfig::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Concurrency outside the supported range.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// Batch size of zero.
    #[error("invalid batch size {value}: must be at least 1")]
    InvalidBatchSize {
        /// The rejected value.
        value: usize,
    },

    /// Attempt bound of zero.
    #[error("invalid max retries {value}: must be at least 1")]
    InvalidMaxRetries {
        /// The rejected value.
        value: u32,
    },

    /// Negative or non-finite rate.
    #[error("invalid rate limit {value}: must be a finite number >= 0 (0 disables pacing)")]
    InvalidRateLimit {
        /// The rejected value.
        value: f64,
    },
}

/// Tunables for one fetch run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetcherConfig {
    /// Identifiers grouped per batch (progress and resource shaping only).
    pub batch_size: usize,
    /// Maximum sustained requests per second. `0` disables pacing.
    pub rate_limit: f64,
    /// Maximum in-flight fetches.
    pub concurrency: usize,
    /// Total attempts per identifier, including the first.
    pub max_retries: u32,
    /// Backoff unit.
    pub retry_delay: Duration,
    /// Cap on a single backoff delay.
    pub max_retry_delay: Duration,
    /// Upper bound of random jitter added to backoff delays.
    pub jitter: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            rate_limit: DEFAULT_RATE_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: crate::harvest::DEFAULT_MAX_RETRIES,
            retry_delay: crate::harvest::DEFAULT_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            jitter: Duration::ZERO,
        }
    }
}

impl FetcherConfig {
    /// Slower, more persistent preset for re-fetching previously failed URLs.
    ///
    /// Concurrency never exceeds the request rate.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            batch_size: CONSERVATIVE_BATCH_SIZE,
            rate_limit: CONSERVATIVE_RATE_LIMIT,
            concurrency: concurrency_for_rate(CONSERVATIVE_RATE_LIMIT, CONSERVATIVE_MAX_CONCURRENCY),
            max_retries: CONSERVATIVE_MAX_RETRIES,
            retry_delay: CONSERVATIVE_RETRY_DELAY,
            ..Self::default()
        }
    }

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize {
                value: self.batch_size,
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries {
                value: self.max_retries,
            });
        }
        if !self.rate_limit.is_finite() || self.rate_limit < 0.0 {
            return Err(ConfigError::InvalidRateLimit {
                value: self.rate_limit,
            });
        }
        Ok(())
    }

    /// Builds the retry policy described by this config.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
            .with_max_delay(self.max_retry_delay)
            .with_jitter(self.jitter)
    }

    /// Builds the global pacer described by this config.
    #[must_use]
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit)
    }
}

/// Concurrency bounded by the request rate: slots beyond the rate would only
/// wait on the pacer.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn concurrency_for_rate(rate: f64, cap: usize) -> usize {
    if rate <= 0.0 {
        return cap;
    }
    (rate.floor() as usize).clamp(MIN_CONCURRENCY, cap)
}

/// File locations under a data root.
///
/// ```text
/// {root}/abstracts/{id}.json
/// {root}/failed_urls.json
/// {root}/fetch_summary.json
/// {root}/unique_pubmed_urls.txt
/// {root}/BioASQ-12b/training/*.json
/// {root}/BioASQ-12b/goldset/*.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("abstracts")
    }

    /// Failure ledger file.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("failed_urls.json")
    }

    /// Run summary file.
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.root.join("fetch_summary.json")
    }

    /// Exported URL list.
    #[must_use]
    pub fn url_list_path(&self) -> PathBuf {
        self.root.join("unique_pubmed_urls.txt")
    }

    /// Default question-set groups.
    #[must_use]
    pub fn source_groups(&self) -> Vec<SourceGroup> {
        let base = self.root.join("BioASQ-12b");
        vec![
            SourceGroup::new("training", base.join("training")),
            SourceGroup::new("goldset", base.join("goldset")),
        ]
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("data")
    }
}

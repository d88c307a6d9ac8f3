//! Rate-limited batch fetcher.
//!
//! [`HarvestEngine`] turns a [`UrlSet`] into cached [`AbstractRecord`]s:
//!
//! 1. URLs are mapped to identifiers. URLs with no identifier fail at once;
//!    URLs sharing an identifier share one fetch.
//! 2. Every identifier is an independent task bounded by one counting
//!    semaphore. `batch_size` only sets how often progress is logged; a
//!    slow identifier never holds back the others.
//! 3. A cached identifier is returned without a slot or a pacing token.
//! 4. Every attempt waits on the global [`RateLimiter`]; failed attempts are
//!    classified and retried per the [`RetryPolicy`].
//! 5. Successful records are cached and collected; failed identifiers are
//!    reported by their originating URLs.
//!
//! A single identifier's failure never aborts the run. An interrupt stops
//! dispatch, cuts backoff sleeps short, and abandons tasks still running
//! after a grace period.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvester_core::cache::CacheStore;
//! use harvester_core::collector::UrlSet;
//! use harvester_core::fetch::{AbstractSource, EntrezClient, EntrezConfig};
//! use harvester_core::harvest::HarvestEngine;
//! use harvester_core::FetcherConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = HarvestEngine::from_config(&FetcherConfig::default())?;
//! let source: Arc<dyn AbstractSource> =
//!     Arc::new(EntrezClient::new(EntrezConfig::new("me@example.org"))?);
//! let cache = CacheStore::new("data/abstracts");
//! let urls: UrlSet = ["http://www.ncbi.nlm.nih.gov/pubmed/15858239"].into_iter().collect();
//!
//! let report = engine.fetch_all(source, &cache, &urls).await?;
//! println!("{} fetched, {} failed", report.records.len(), report.failed_urls.len());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::rate_limiter::RateLimiter;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use crate::cache::CacheStore;
use crate::collector::{UrlSet, extract_identifier};
use crate::config::{FetcherConfig, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::fetch::{AbstractRecord, AbstractSource, FetchError};

/// Time in-flight tasks get to finish after an interrupt before they are aborted.
const INTERRUPT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Poll interval for the interrupt flag while waiting on a slot, a task, or a backoff.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Error type for engine construction and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Batch size of zero.
    #[error("invalid batch size {value}: must be at least 1")]
    InvalidBatchSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Live counters for a run, updated atomically by fetch tasks.
///
/// Counts are per identifier except `requests` and `retried`, which count
/// attempts. Every [`HarvestEngine::fetch_all`] run starts from zero.
#[derive(Debug, Default)]
pub struct FetchStats {
    total: AtomicUsize,
    processed: AtomicUsize,
    fetched: AtomicUsize,
    cached: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
    requests: AtomicUsize,
    interrupted: AtomicBool,
}

impl FetchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers scheduled in the current run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Identifiers fetched from the provider.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    /// Identifiers served from the cache.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cached.load(Ordering::SeqCst)
    }

    /// Identifiers that failed for this run.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Identifiers processed so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Retry attempts made.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Requests sent to the provider.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Whether the run stopped early on an interrupt.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Counts one terminal outcome and returns the new processed count.
    fn record(&self, outcome: &FetchOutcome) -> usize {
        let counter = match outcome {
            FetchOutcome::Fetched { .. } => &self.fetched,
            FetchOutcome::Cached(_) => &self.cached,
            FetchOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn reset(&self) {
        for counter in [
            &self.total,
            &self.processed,
            &self.fetched,
            &self.cached,
            &self.failed,
            &self.retried,
            &self.requests,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        self.interrupted.store(false, Ordering::SeqCst);
    }

    fn add_total(&self, count: usize) {
        self.total.fetch_add(count, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_requests(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

/// Terminal result for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from the cache with no network call.
    Cached(AbstractRecord),

    /// Fetched from the provider and cached.
    Fetched {
        /// The fetched record.
        record: AbstractRecord,
        /// Attempts used, including the successful one.
        attempts: u32,
    },

    /// Failed for this run.
    Failed {
        /// The last error observed.
        error: FetchError,
        /// Attempts made (0 when no request was sent).
        attempts: u32,
    },
}

impl FetchOutcome {
    /// Returns the record on success.
    #[must_use]
    pub fn record(&self) -> Option<&AbstractRecord> {
        match self {
            Self::Cached(record) | Self::Fetched { record, .. } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    /// Consumes the outcome, returning the record on success.
    #[must_use]
    pub fn into_record(self) -> Option<AbstractRecord> {
        match self {
            Self::Cached(record) | Self::Fetched { record, .. } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    /// Returns true when the identifier failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Aggregated result of [`HarvestEngine::fetch_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Successful records, one per identifier, in no meaningful order.
    pub records: Vec<AbstractRecord>,
    /// Originating URLs of every failed identifier, sorted.
    pub failed_urls: Vec<String>,
    /// Number of URLs submitted.
    pub total_urls: usize,
    /// Number of URLs whose identifier succeeded.
    pub successful_urls: usize,
    /// Whether dispatch stopped early on an interrupt.
    pub interrupted: bool,
}

/// Concurrent, paced, retrying fetcher.
///
/// Cloning is cheap; clones share the concurrency slots, the pacer and the
/// counters.
#[derive(Debug, Clone)]
pub struct HarvestEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    batch_size: usize,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    stats: Arc<FetchStats>,
}

impl HarvestEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is outside
    /// 1-100 and [`EngineError::InvalidBatchSize`] if `batch_size` is zero.
    #[instrument(level = "debug", skip(retry_policy, rate_limiter))]
    pub fn new(
        concurrency: usize,
        batch_size: usize,
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        if batch_size == 0 {
            return Err(EngineError::InvalidBatchSize { value: batch_size });
        }

        debug!(
            concurrency,
            batch_size,
            max_attempts = retry_policy.max_attempts(),
            interval_ms = rate_limiter.min_interval().as_millis(),
            rate_limit_disabled = rate_limiter.is_disabled(),
            "creating harvest engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            batch_size,
            retry_policy,
            rate_limiter,
            stats: Arc::new(FetchStats::new()),
        })
    }

    /// Creates an engine from a run configuration.
    ///
    /// # Errors
    ///
    /// Same as [`HarvestEngine::new`].
    pub fn from_config(config: &FetcherConfig) -> Result<Self, EngineError> {
        Self::new(
            config.concurrency,
            config.batch_size,
            config.retry_policy(),
            Arc::new(config.rate_limiter()),
        )
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns the live counters.
    #[must_use]
    pub fn stats(&self) -> Arc<FetchStats> {
        Arc::clone(&self.stats)
    }

    /// Fetches one identifier: cache, then slot, then paced attempts.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the slot pool is closed.
    /// Fetch failures are reported as [`FetchOutcome::Failed`], not as errors.
    #[instrument(skip(self, source, cache))]
    pub async fn fetch_one(
        &self,
        source: &dyn AbstractSource,
        cache: &CacheStore,
        id: &str,
    ) -> Result<FetchOutcome, EngineError> {
        let outcome = if let Some(record) = read_cached(cache, id).await {
            FetchOutcome::Cached(record)
        } else {
            let _permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;
            self.fetch_uncached(source, cache, id, &AtomicBool::new(false))
                .await
        };
        self.stats.record(&outcome);
        Ok(outcome)
    }

    /// Fetches every URL in the set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the slot pool is closed.
    pub async fn fetch_all(
        &self,
        source: Arc<dyn AbstractSource>,
        cache: &CacheStore,
        urls: &UrlSet,
    ) -> Result<FetchReport, EngineError> {
        self.fetch_all_interruptible(source, cache, urls, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Fetches every URL in the set, stopping when `interrupted` becomes
    /// `true`.
    ///
    /// After an interrupt no new identifier is dispatched and pending backoff
    /// sleeps end at once. Requests already in flight get a short grace
    /// period and are then aborted. Every URL that was not fetched
    /// successfully, dispatched or not, is reported as failed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the slot pool is closed.
    #[instrument(skip_all, fields(urls = urls.len(), batch_size = self.batch_size))]
    pub async fn fetch_all_interruptible(
        &self,
        source: Arc<dyn AbstractSource>,
        cache: &CacheStore,
        urls: &UrlSet,
        interrupted: Arc<AtomicBool>,
    ) -> Result<FetchReport, EngineError> {
        let (by_id, unresolved) = group_by_identifier(urls);
        let ids: Vec<String> = by_id.keys().cloned().collect();
        let started = Instant::now();
        self.stats.reset();
        self.stats.add_total(ids.len());

        info!(
            urls = urls.len(),
            identifiers = ids.len(),
            unresolved = unresolved.len(),
            batches = ids.len().div_ceil(self.batch_size),
            "starting fetch"
        );

        let mut outcomes: BTreeMap<String, FetchOutcome> = BTreeMap::new();
        let handles = self
            .dispatch(&source, cache, &ids, &mut outcomes, &interrupted, started)
            .await?;
        self.join_tasks(handles, &mut outcomes, &interrupted).await;

        let report = build_report(urls.len(), &by_id, unresolved, outcomes, &self.stats);
        info!(
            total_urls = report.total_urls,
            successful_urls = report.successful_urls,
            failed_urls = report.failed_urls.len(),
            retried = self.stats.retried(),
            requests = self.stats.requests(),
            interrupted = report.interrupted,
            "fetch complete"
        );
        Ok(report)
    }

    /// Dispatches every identifier. Cached identifiers resolve inline; the
    /// rest are spawned as soon as a slot is free.
    async fn dispatch(
        &self,
        source: &Arc<dyn AbstractSource>,
        cache: &CacheStore,
        ids: &[String],
        outcomes: &mut BTreeMap<String, FetchOutcome>,
        interrupted: &Arc<AtomicBool>,
        started: Instant,
    ) -> Result<Vec<(String, JoinHandle<FetchOutcome>)>, EngineError> {
        let mut handles = Vec::with_capacity(ids.len());

        for id in ids {
            if interrupted.load(Ordering::SeqCst) {
                self.stats.set_interrupted();
                break;
            }

            if let Some(record) = read_cached(cache, id).await {
                debug!(id = %id, "cache hit");
                let outcome = FetchOutcome::Cached(record);
                self.record_progress(&outcome, started);
                outcomes.insert(id.clone(), outcome);
                continue;
            }

            let Some(permit) = self.acquire_slot(interrupted).await? else {
                self.stats.set_interrupted();
                break;
            };

            let engine = self.clone();
            let source = Arc::clone(source);
            let cache = cache.clone();
            let interrupted = Arc::clone(interrupted);
            let task_id = id.clone();
            handles.push((
                id.clone(),
                tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII)
                    let _permit = permit;
                    let outcome = engine
                        .fetch_uncached(source.as_ref(), &cache, &task_id, &interrupted)
                        .await;
                    engine.record_progress(&outcome, started);
                    outcome
                }),
            ));
        }

        Ok(handles)
    }

    /// Waits for a free slot, racing the interrupt flag. Returns `None` when
    /// interrupted first.
    async fn acquire_slot(
        &self,
        interrupted: &AtomicBool,
    ) -> Result<Option<OwnedSemaphorePermit>, EngineError> {
        tokio::select! {
            biased;
            () = wait_for_interrupt(interrupted) => Ok(None),
            result = Arc::clone(&self.semaphore).acquire_owned() => {
                result.map(Some).map_err(|_| EngineError::SemaphoreClosed)
            }
        }
    }

    /// Counts an outcome and logs progress each time another `batch_size`
    /// identifiers are done.
    fn record_progress(&self, outcome: &FetchOutcome, started: Instant) {
        let processed = self.stats.record(outcome);
        let total = self.stats.total();
        if processed % self.batch_size != 0 && processed != total {
            return;
        }
        info!(
            batch = processed.div_ceil(self.batch_size),
            batches = total.div_ceil(self.batch_size),
            processed,
            total,
            fetched = self.stats.fetched(),
            cached = self.stats.cached(),
            failed = self.stats.failed(),
            "batch complete"
        );
        log_request_rate(&self.stats, started.elapsed());
    }

    /// Collects task outcomes. Once the interrupt flag is seen, tasks still
    /// running at the end of the grace period are aborted and count as
    /// failed.
    async fn join_tasks(
        &self,
        handles: Vec<(String, JoinHandle<FetchOutcome>)>,
        outcomes: &mut BTreeMap<String, FetchOutcome>,
        interrupted: &AtomicBool,
    ) {
        let mut deadline: Option<Instant> = None;

        for (id, mut handle) in handles {
            let joined = loop {
                if deadline.is_none() && interrupted.load(Ordering::SeqCst) {
                    self.stats.set_interrupted();
                    deadline = Some(Instant::now() + INTERRUPT_GRACE_PERIOD);
                }

                if let Some(deadline) = deadline {
                    if let Ok(joined) = tokio::time::timeout_at(deadline, &mut handle).await {
                        break Some(joined);
                    }
                    handle.abort();
                    // The task may have completed before the abort landed.
                    break match (&mut handle).await {
                        Err(e) if e.is_cancelled() => None,
                        joined => Some(joined),
                    };
                }

                tokio::select! {
                    joined = &mut handle => break Some(joined),
                    () = wait_for_interrupt(interrupted) => {}
                }
            };

            let outcome = match joined {
                Some(Ok(outcome)) => outcome,
                Some(Err(e)) => {
                    warn!(id = %id, error = %e, "fetch task panicked");
                    let outcome = FetchOutcome::Failed {
                        error: FetchError::unexpected(&id, format!("task failed: {e}")),
                        attempts: 0,
                    };
                    self.stats.record(&outcome);
                    outcome
                }
                None => {
                    warn!(id = %id, "abandoning in-flight fetch after interrupt");
                    let outcome = FetchOutcome::Failed {
                        error: FetchError::unexpected(&id, "interrupted"),
                        attempts: 0,
                    };
                    self.stats.record(&outcome);
                    outcome
                }
            };
            outcomes.insert(id, outcome);
        }
    }

    /// Paced attempts with retry, assuming a slot is already held.
    async fn fetch_uncached(
        &self,
        source: &dyn AbstractSource,
        cache: &CacheStore,
        id: &str,
        interrupted: &AtomicBool,
    ) -> FetchOutcome {
        match self.fetch_with_retry(source, id, interrupted).await {
            Ok((record, attempts)) => {
                if let Err(e) = cache.write(id, &record).await {
                    warn!(id, error = %e, "failed to cache abstract");
                }
                debug!(id, attempts, "fetched abstract");
                FetchOutcome::Fetched { record, attempts }
            }
            Err((error, attempts)) => {
                warn!(id, error = %error, attempts, "fetch failed");
                FetchOutcome::Failed { error, attempts }
            }
        }
    }

    /// Runs the attempt loop for one identifier.
    ///
    /// Returns the record and attempt count on success, or the last error and
    /// attempt count once the policy gives up or the run is interrupted.
    #[instrument(skip(self, source, interrupted), fields(source = source.name()))]
    async fn fetch_with_retry(
        &self,
        source: &dyn AbstractSource,
        id: &str,
        interrupted: &AtomicBool,
    ) -> Result<(AbstractRecord, u32), (FetchError, u32)> {
        let mut attempt = 0u32;

        loop {
            self.rate_limiter.acquire().await;
            self.stats.increment_requests();
            debug!(attempt, "attempting fetch");

            let error = match source.get_by_id(id).await {
                Ok(record) => return Ok((record, attempt + 1)),
                Err(e) => e,
            };

            let failure_type = classify_error(&error);
            let retry_after = match failure_type {
                FailureType::RateLimited => error.retry_after(),
                FailureType::Permanent | FailureType::Transient => None,
            };
            if let Some(hint) = retry_after {
                self.rate_limiter.record_rate_limit(hint);
            }

            match self.retry_policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay: backoff,
                    attempt: next_attempt,
                } => {
                    if interrupted.load(Ordering::SeqCst) {
                        self.stats.set_interrupted();
                        debug!(id, "interrupted, not retrying");
                        return Err((error, attempt + 1));
                    }

                    let delay = retry_after.map_or(backoff, |hint| backoff.max(hint));
                    info!(
                        id,
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = retry_after.is_some(),
                        error = %error,
                        "retrying fetch"
                    );
                    self.stats.increment_retried();
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = wait_for_interrupt(interrupted) => {
                            self.stats.set_interrupted();
                            debug!(id, "interrupted during backoff");
                            return Err((error, attempt + 1));
                        }
                    }
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(id, %reason, "not retrying fetch");
                    return Err((error, attempt + 1));
                }
            }
        }
    }
}

/// Resolves once `interrupted` is set.
async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}

/// Reads a cached record. A corrupt entry is logged and treated as a miss.
async fn read_cached(cache: &CacheStore, id: &str) -> Option<AbstractRecord> {
    if !cache.exists(id).await {
        return None;
    }
    match cache.read(id).await {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(id, error = %e, "ignoring unreadable cache entry");
            None
        }
    }
}

/// Maps URLs to identifiers. Returns the identifier groups and the URLs
/// that carry no identifier.
fn group_by_identifier(urls: &UrlSet) -> (BTreeMap<String, Vec<String>>, Vec<String>) {
    let mut by_id: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut unresolved = Vec::new();

    for url in urls.iter() {
        match extract_identifier(url) {
            Some(id) => by_id.entry(id).or_default().push(url.to_string()),
            None => {
                warn!(url, "no identifier in URL");
                unresolved.push(url.to_string());
            }
        }
    }

    (by_id, unresolved)
}

fn build_report(
    total_urls: usize,
    by_id: &BTreeMap<String, Vec<String>>,
    unresolved: Vec<String>,
    mut outcomes: BTreeMap<String, FetchOutcome>,
    stats: &FetchStats,
) -> FetchReport {
    let mut report = FetchReport {
        total_urls,
        failed_urls: unresolved,
        interrupted: stats.was_interrupted(),
        ..FetchReport::default()
    };

    for (id, urls) in by_id {
        match outcomes.remove(id).and_then(FetchOutcome::into_record) {
            Some(record) => {
                report.successful_urls += urls.len();
                report.records.push(record);
            }
            None => report.failed_urls.extend(urls.iter().cloned()),
        }
    }

    report.failed_urls.sort();
    report
}

#[allow(clippy::cast_precision_loss)]
fn log_request_rate(stats: &FetchStats, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return;
    }
    let requests = stats.requests();
    info!(
        requests,
        elapsed_secs = elapsed.as_secs(),
        requests_per_sec = requests as f64 / secs,
        "request rate"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_rate_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::disabled())
    }

    #[test]
    fn test_engine_new_valid_concurrency() {
        for concurrency in [1, 10, 100] {
            let engine =
                HarvestEngine::new(concurrency, 10, RetryPolicy::default(), test_rate_limiter())
                    .unwrap();
            assert_eq!(engine.concurrency(), concurrency);
        }
    }

    #[test]
    fn test_engine_new_invalid_concurrency() {
        assert!(matches!(
            HarvestEngine::new(0, 10, RetryPolicy::default(), test_rate_limiter()),
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
        assert!(matches!(
            HarvestEngine::new(101, 10, RetryPolicy::default(), test_rate_limiter()),
            Err(EngineError::InvalidConcurrency { value: 101 })
        ));
    }

    #[test]
    fn test_engine_new_invalid_batch_size() {
        assert!(matches!(
            HarvestEngine::new(1, 0, RetryPolicy::default(), test_rate_limiter()),
            Err(EngineError::InvalidBatchSize { value: 0 })
        ));
    }

    #[test]
    fn test_from_config_uses_config_values() {
        let engine = HarvestEngine::from_config(&FetcherConfig::conservative()).unwrap();
        assert_eq!(engine.concurrency(), 3);
        assert_eq!(engine.batch_size(), 10);
        assert_eq!(engine.retry_policy().max_attempts(), 5);
    }

    #[test]
    fn test_engine_error_display() {
        let msg = EngineError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_stats_record_outcomes() {
        let stats = FetchStats::new();
        let record = AbstractRecord::new("1", "t");
        stats.record(&FetchOutcome::Cached(record.clone()));
        stats.record(&FetchOutcome::Fetched {
            record,
            attempts: 2,
        });
        stats.record(&FetchOutcome::Failed {
            error: FetchError::client("3", "none"),
            attempts: 1,
        });
        stats.increment_retried();
        assert_eq!(stats.cached(), 1);
        assert_eq!(stats.fetched(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.processed(), 3);
        assert_eq!(stats.retried(), 1);
    }

    #[test]
    fn test_stats_reset_starts_a_fresh_run() {
        let stats = FetchStats::new();
        stats.add_total(2);
        assert_eq!(stats.record(&FetchOutcome::Cached(AbstractRecord::new("1", "t"))), 1);
        stats.increment_requests();
        stats.set_interrupted();

        stats.reset();

        assert_eq!(stats.total(), 0);
        assert_eq!(stats.processed(), 0);
        assert_eq!(stats.cached(), 0);
        assert_eq!(stats.requests(), 0);
        assert!(!stats.was_interrupted());
        assert_eq!(
            stats.record(&FetchOutcome::Failed {
                error: FetchError::client("2", "none"),
                attempts: 1,
            }),
            1
        );
    }

    #[test]
    fn test_group_by_identifier_merges_and_separates() {
        let urls: UrlSet = [
            "http://www.ncbi.nlm.nih.gov/pubmed/1",
            "https://pubmed.ncbi.nlm.nih.gov/1/",
            "http://www.ncbi.nlm.nih.gov/pubmed/2",
            "http://www.ncbi.nlm.nih.gov/",
        ]
        .into_iter()
        .collect();

        let (by_id, unresolved) = group_by_identifier(&urls);
        assert_eq!(by_id.len(), 2);
        assert_eq!(by_id["1"].len(), 2);
        assert_eq!(unresolved, vec!["http://www.ncbi.nlm.nih.gov/".to_string()]);
    }

    #[test]
    fn test_build_report_fans_out_outcomes_to_urls() {
        let mut by_id = BTreeMap::new();
        by_id.insert("1".to_string(), vec!["a/1".to_string(), "b/1".to_string()]);
        by_id.insert("2".to_string(), vec!["a/2".to_string()]);

        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            "1".to_string(),
            FetchOutcome::Cached(AbstractRecord::new("1", "t")),
        );
        outcomes.insert(
            "2".to_string(),
            FetchOutcome::Failed {
                error: FetchError::rate_limited("2"),
                attempts: 3,
            },
        );

        let report = build_report(4, &by_id, vec!["x/".to_string()], outcomes, &FetchStats::new());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.successful_urls, 2);
        assert_eq!(report.failed_urls, vec!["a/2".to_string(), "x/".to_string()]);
        assert_eq!(report.total_urls, report.successful_urls + report.failed_urls.len());
    }
}

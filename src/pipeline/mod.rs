//! Top-level drivers: the main fetch run and the retry pass.
//!
//! Both drivers share one [`Pipeline`]: the same engine, cache and ledger,
//! differing only in where the URLs come from.
//!
//! - [`Pipeline::run`]: collect URLs from the source groups, fetch them,
//!   persist the [`RunSummary`], settle the ledger.
//! - [`Pipeline::retry_failed`]: load the ledger, fetch its URLs, settle the
//!   ledger again.
//!
//! Neither driver fails because individual identifiers failed; those end up
//! in the summary and the ledger.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cache::CacheStore;
use crate::collector::{self, CollectError, UrlSet};
use crate::config::{ConfigError, DataLayout, FetcherConfig};
use crate::fetch::AbstractSource;
use crate::harvest::{EngineError, FetchStats, HarvestEngine};
use crate::ledger::{FailureLedger, LedgerError};
use crate::summary::RunSummary;

/// Errors that abort a driver.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration rejected before any work started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Engine could not be built or lost its slot pool.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// URL list could not be exported.
    #[error(transparent)]
    Collect(#[from] CollectError),

    /// Ledger could not be read or written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Summary could not be written.
    #[error("failed to write run summary to {path}: {source}")]
    Summary {
        /// Summary path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result of a driver that completed without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No URLs to process; nothing was fetched or written.
    NothingToDo,
    /// The run finished; counts are in the summary.
    Completed(RunSummary),
}

impl RunOutcome {
    /// URLs fetched successfully (zero when there was nothing to do).
    #[must_use]
    pub fn successful_fetches(&self) -> usize {
        match self {
            Self::NothingToDo => 0,
            Self::Completed(summary) => summary.successful_fetches,
        }
    }

    /// The summary, when the run did any work.
    #[must_use]
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::NothingToDo => None,
            Self::Completed(summary) => Some(summary),
        }
    }
}

/// Collects URLs from the layout's source groups and exports the list.
///
/// # Errors
///
/// Returns [`CollectError::Io`] when the URL list cannot be written. Source
/// files that fail to parse are skipped, not reported as errors.
pub fn collect_urls(layout: &DataLayout) -> Result<UrlSet, CollectError> {
    let urls = collector::collect(&layout.source_groups());
    if !urls.is_empty() {
        urls.save(&layout.url_list_path())?;
    }
    Ok(urls)
}

/// One configured harvest: source, engine, cache and ledger.
pub struct Pipeline {
    source: Arc<dyn AbstractSource>,
    engine: HarvestEngine,
    cache: CacheStore,
    ledger: FailureLedger,
    layout: DataLayout,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.name())
            .field("engine", &self.engine)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Validates `config` and wires the engine, cache and ledger for `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when the config is out of range.
    pub fn new(
        source: Arc<dyn AbstractSource>,
        config: &FetcherConfig,
        layout: DataLayout,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            source,
            engine: HarvestEngine::from_config(config)?,
            cache: CacheStore::new(layout.cache_dir()),
            ledger: FailureLedger::new(layout.ledger_path()),
            layout,
        })
    }

    /// Live counters of the underlying engine.
    #[must_use]
    pub fn stats(&self) -> Arc<FetchStats> {
        self.engine.stats()
    }

    /// The cache used by this pipeline.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The ledger used by this pipeline.
    #[must_use]
    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    /// Main run: collect, fetch, summarize, settle the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the URL list, summary or ledger cannot
    /// be written, or the engine fails.
    #[instrument(skip_all, fields(root = %self.layout.root().display()))]
    pub async fn run(&self, interrupted: Arc<AtomicBool>) -> Result<RunOutcome, PipelineError> {
        let urls = collect_urls(&self.layout)?;
        if urls.is_empty() {
            warn!("no document URLs found in any source group");
            return Ok(RunOutcome::NothingToDo);
        }
        self.fetch_and_settle(&urls, interrupted).await
    }

    /// Fetches the URLs directly, bypassing collection.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::run`].
    pub async fn run_urls(
        &self,
        urls: &UrlSet,
        interrupted: Arc<AtomicBool>,
    ) -> Result<RunOutcome, PipelineError> {
        if urls.is_empty() {
            return Ok(RunOutcome::NothingToDo);
        }
        self.fetch_and_settle(urls, interrupted).await
    }

    /// Retry pass: re-fetch the ledger's URLs and settle the ledger.
    ///
    /// A missing or empty ledger is [`RunOutcome::NothingToDo`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Ledger`] when the ledger cannot be read or
    /// written, [`PipelineError::Summary`] when the summary cannot be written.
    #[instrument(skip_all, fields(ledger = %self.ledger.path().display()))]
    pub async fn retry_failed(
        &self,
        interrupted: Arc<AtomicBool>,
    ) -> Result<RunOutcome, PipelineError> {
        let urls = self.ledger.load().await?;
        if urls.is_empty() {
            info!("no failed URLs to retry");
            return Ok(RunOutcome::NothingToDo);
        }
        info!(count = urls.len(), "retrying failed URLs");
        self.fetch_and_settle(&urls, interrupted).await
    }

    async fn fetch_and_settle(
        &self,
        urls: &UrlSet,
        interrupted: Arc<AtomicBool>,
    ) -> Result<RunOutcome, PipelineError> {
        let report = self
            .engine
            .fetch_all_interruptible(Arc::clone(&self.source), &self.cache, urls, interrupted)
            .await?;

        let summary = RunSummary::from_report(&report, self.cache.dir());
        let summary_path = self.layout.summary_path();
        summary
            .save(&summary_path)
            .await
            .map_err(|source| PipelineError::Summary {
                path: summary_path,
                source,
            })?;

        self.ledger.settle(&report.failed_urls).await?;

        info!(
            total_urls = summary.total_urls,
            successful_fetches = summary.successful_fetches,
            failed_fetches = summary.failed_fetches,
            interrupted = report.interrupted,
            "run complete"
        );
        Ok(RunOutcome::Completed(summary))
    }
}

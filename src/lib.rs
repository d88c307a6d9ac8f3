//! Abstract Harvester Core Library
//!
//! Builds a local corpus of biomedical abstracts from question-set files:
//! document URLs are collected and deduplicated, each identifier is fetched
//! from the provider at most once across runs, and permanent failures are
//! recorded for a later retry pass.
//!
//! # Architecture
//!
//! - [`collector`] - Identifier collection from question-set source files
//! - [`cache`] - Per-identifier record cache
//! - [`fetch`] - Fetch client capability, NCBI E-utilities binding, MEDLINE parsing
//! - [`harvest`] - Rate-limited, retrying batch fetcher
//! - [`ledger`] - Failure ledger for the retry pass
//! - [`summary`] - Run summary persistence
//! - [`config`] - Run configuration and data layout
//! - [`pipeline`] - Main run and retry drivers

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod collector;
pub mod config;
pub mod fetch;
pub mod harvest;
pub mod ledger;
pub mod pipeline;
pub mod summary;
mod user_agent;

// Re-export commonly used types
pub use cache::{CacheError, CacheStore};
pub use collector::{CollectError, SourceGroup, UrlSet, extract_identifier};
pub use config::{ConfigError, DataLayout, FetcherConfig};
pub use fetch::{AbstractRecord, AbstractSource, EntrezClient, EntrezConfig, FetchError};
pub use harvest::{
    EngineError, FailureType, FetchOutcome, FetchReport, FetchStats, HarvestEngine, RateLimiter,
    RetryDecision, RetryPolicy, classify_error,
};
pub use ledger::{FailureLedger, LedgerError};
pub use pipeline::{Pipeline, PipelineError, RunOutcome, collect_urls};
pub use summary::RunSummary;

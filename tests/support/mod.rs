//! Shared helpers for integration tests: a scripted in-memory abstract source.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use harvester_core::{AbstractRecord, AbstractSource, FetchError};

/// How the scripted source answers for one identifier.
#[derive(Debug, Clone)]
pub enum Script {
    /// Always returns a record.
    Succeed,
    /// Always rate limited.
    RateLimited,
    /// Always rate limited, with a Retry-After hint.
    RateLimitedFor(Duration),
    /// Always a client error (no record exists).
    ClientError,
    /// Always an unexpected error.
    Unexpected,
    /// Unexpected errors for the first `n` calls, then success.
    FailThenSucceed(usize),
    /// Rate limited for the first `n` calls, then success.
    RateLimitedThenSucceed(usize),
}

/// In-memory [`AbstractSource`] driven by per-identifier scripts.
///
/// Unscripted identifiers succeed. Every call is counted, and the maximum
/// number of simultaneous calls is tracked.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Script>,
    calls: Mutex<HashMap<String, usize>>,
    first_calls: Mutex<HashMap<String, Instant>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, script: Script) -> Self {
        self.scripts.insert(id.to_string(), script);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self, id: &str) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// When the identifier was first requested, if ever.
    pub fn first_call_at(&self, id: &str) -> Option<Instant> {
        self.first_calls.lock().unwrap().get(id).copied()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_call(&self, id: &str) -> usize {
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(id.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.first_calls
                .lock()
                .unwrap()
                .insert(id.to_string(), Instant::now());
        }
        *count
    }
}

pub fn sample_record(id: &str) -> AbstractRecord {
    let mut record = AbstractRecord::new(id, format!("Title {id}"));
    record.abstract_text = format!("Abstract for {id}");
    record.publication_date = "2024".to_string();
    record.journal = "Test Journal".to_string();
    record
}

#[async_trait]
impl AbstractSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn get_by_id(&self, id: &str) -> Result<AbstractRecord, FetchError> {
        let call = self.next_call(id);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.scripts.get(id).cloned().unwrap_or(Script::Succeed) {
            Script::Succeed => Ok(sample_record(id)),
            Script::RateLimited => Err(FetchError::rate_limited(id)),
            Script::RateLimitedFor(hint) => Err(FetchError::rate_limited_with_retry_after(
                id,
                429,
                Some(hint),
            )),
            Script::ClientError => Err(FetchError::client(id, "no abstract found")),
            Script::Unexpected => Err(FetchError::unexpected(id, "connection reset")),
            Script::FailThenSucceed(n) if call <= n => {
                Err(FetchError::unexpected(id, "connection reset"))
            }
            Script::RateLimitedThenSucceed(n) if call <= n => Err(FetchError::rate_limited(id)),
            Script::FailThenSucceed(_) | Script::RateLimitedThenSucceed(_) => {
                Ok(sample_record(id))
            }
        }
    }
}

/// PubMed-style URL for an identifier.
pub fn pubmed_url(id: &str) -> String {
    format!("http://www.ncbi.nlm.nih.gov/pubmed/{id}")
}

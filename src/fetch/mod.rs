//! Fetch clients: the capability that turns an identifier into an abstract.
//!
//! The harvest engine only depends on the [`AbstractSource`] trait. Any
//! binding satisfies it: the bundled [`EntrezClient`] for NCBI E-utilities,
//! or a scripted mock in tests.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::fetch::{AbstractSource, EntrezClient, EntrezConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = EntrezClient::new(EntrezConfig::new("me@example.org"))?;
//! let record = client.get_by_id("15858239").await?;
//! println!("{}", record.title);
//! # Ok(())
//! # }
//! ```

mod entrez;
mod error;
pub mod medline;
mod record;

pub use entrez::{DEFAULT_EUTILS_BASE_URL, DEFAULT_TOOL_NAME, EntrezClient, EntrezConfig};
pub use error::FetchError;
pub use record::AbstractRecord;

use async_trait::async_trait;

/// A provider that can fetch abstracts by identifier.
///
/// Implementations classify every failure into a [`FetchError`] variant;
/// the harvest engine decides retry behavior from that class alone.
#[async_trait]
pub trait AbstractSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetches one abstract.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] classified by cause.
    async fn get_by_id(&self, id: &str) -> Result<AbstractRecord, FetchError>;

    /// Fetches several abstracts.
    ///
    /// The default implementation calls [`get_by_id`](Self::get_by_id)
    /// sequentially and stops at the first failure. A returned sequence must
    /// contain exactly one record per requested identifier.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] from the first failing identifier, or a
    /// [`FetchError::ClientError`] when the provider returns the wrong count.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<AbstractRecord>, FetchError> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(self.get_by_id(id).await?);
        }
        Ok(records)
    }
}

/// Checks the `get_many` contract: one record per requested identifier.
///
/// # Errors
///
/// Returns [`FetchError::ClientError`] naming the first identifier when the
/// counts differ.
pub fn ensure_record_count(
    ids: &[String],
    records: Vec<AbstractRecord>,
) -> Result<Vec<AbstractRecord>, FetchError> {
    if records.len() == ids.len() {
        return Ok(records);
    }
    let first = ids.first().map_or("", String::as_str);
    Err(FetchError::client(
        first,
        format!(
            "expected {} records for batch, provider returned {}",
            ids.len(),
            records.len()
        ),
    ))
}

//! Failure ledger: the URLs that failed in the last run.
//!
//! Stored as a JSON array of URL strings. The file exists only while there
//! are outstanding failures; settling with an empty list deletes it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::collector::UrlSet;

/// Errors raised by [`FailureLedger`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Ledger file could not be read, written or removed.
    #[error("ledger IO error on {path}: {source}")]
    Io {
        /// The ledger path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Ledger file is not a JSON array of strings.
    #[error("malformed ledger {path}: {source}")]
    Malformed {
        /// The ledger path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn malformed(path: &Path, source: serde_json::Error) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Handle to the ledger file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureLedger {
    path: PathBuf,
}

impl FailureLedger {
    /// Creates a handle; nothing is read or written yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the recorded URLs. A missing ledger is empty.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] when the file exists but cannot be read and
    /// [`LedgerError::Malformed`] when it is not a JSON array of strings.
    pub async fn load(&self) -> Result<UrlSet, LedgerError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no failure ledger");
                return Ok(UrlSet::new());
            }
            Err(e) => return Err(LedgerError::io(&self.path, e)),
        };

        let urls: Vec<String> =
            serde_json::from_slice(&content).map_err(|e| LedgerError::malformed(&self.path, e))?;
        Ok(urls.into_iter().collect())
    }

    /// Makes the ledger reflect `failed`: overwritten with exactly those URLs,
    /// or deleted when there are none.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] when the file cannot be written or removed.
    pub async fn settle(&self, failed: &[String]) -> Result<(), LedgerError> {
        if failed.is_empty() {
            return self.clear().await;
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::io(parent, e))?;
        }
        let json =
            serde_json::to_vec_pretty(failed).map_err(|e| LedgerError::malformed(&self.path, e))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| LedgerError::io(&self.path, e))?;

        info!(count = failed.len(), path = %self.path.display(), "saved failed URLs");
        Ok(())
    }

    async fn clear(&self) -> Result<(), LedgerError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "no failures remain, removed ledger");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LedgerError::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let ledger = FailureLedger::new(temp.path().join("failed_urls.json"));
        assert!(ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settle_writes_then_load_reads_back() {
        let temp = TempDir::new().unwrap();
        let ledger = FailureLedger::new(temp.path().join("failed_urls.json"));
        let failed = vec!["http://x/pubmed/2".to_string(), "http://x/pubmed/1".to_string()];

        ledger.settle(&failed).await.unwrap();

        let loaded = ledger.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("http://x/pubmed/1"));
    }

    #[tokio::test]
    async fn test_settle_empty_deletes_file() {
        let temp = TempDir::new().unwrap();
        let ledger = FailureLedger::new(temp.path().join("failed_urls.json"));
        ledger.settle(&["http://x/pubmed/1".to_string()]).await.unwrap();
        assert!(ledger.path().exists());

        ledger.settle(&[]).await.unwrap();
        assert!(!ledger.path().exists());

        // Settling again with nothing to remove is fine.
        ledger.settle(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_malformed_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("failed_urls.json");
        tokio::fs::write(&path, b"{\"not\": \"a list\"}").await.unwrap();
        assert!(matches!(
            FailureLedger::new(path).load().await,
            Err(LedgerError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_ledger_file_is_json_array() {
        let temp = TempDir::new().unwrap();
        let ledger = FailureLedger::new(temp.path().join("failed_urls.json"));
        ledger.settle(&["u1".to_string()]).await.unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(ledger.path()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!(["u1"]));
    }
}

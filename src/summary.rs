//! Run summary persisted after each fetch run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::harvest::FetchReport;

/// Counts for one run. `successful_fetches + failed_fetches == total_urls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// URLs submitted.
    pub total_urls: usize,
    /// URLs whose abstract is now cached.
    pub successful_fetches: usize,
    /// URLs that failed for this run.
    pub failed_fetches: usize,
    /// Where the abstracts were cached.
    pub cache_directory_path: PathBuf,
}

impl RunSummary {
    /// Builds a summary from a fetch report.
    #[must_use]
    pub fn from_report(report: &FetchReport, cache_dir: &Path) -> Self {
        Self {
            total_urls: report.total_urls,
            successful_fetches: report.successful_urls,
            failed_fetches: report.failed_urls.len(),
            cache_directory_path: cache_dir.to_path_buf(),
        }
    }

    /// Writes the summary as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file cannot be written.
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), "saved run summary");
        Ok(())
    }

    /// Reads a summary written by [`RunSummary::save`].
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file cannot be read or parsed.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

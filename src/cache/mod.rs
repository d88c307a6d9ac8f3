//! Per-identifier cache of fetched abstracts.
//!
//! Each record is stored as `{dir}/{id}.json`. A record that exists in the
//! cache is never fetched again, which makes repeated runs resumable.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::fetch::AbstractRecord;

/// Errors raised by [`CacheStore`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// File or directory could not be read or written.
    #[error("cache IO error on {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Cached file is not a valid record.
    #[error("corrupt cache entry {path}: {source}")]
    Corrupt {
        /// The offending cache file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a corrupt-entry error.
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }
}

/// Directory-backed store of [`AbstractRecord`]s keyed by identifier.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for an identifier.
    #[must_use]
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Returns true when a record for `id` is cached.
    pub async fn exists(&self, id: &str) -> bool {
        tokio::fs::try_exists(self.path_for(id))
            .await
            .unwrap_or(false)
    }

    /// Reads the cached record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file cannot be read and
    /// [`CacheError::Corrupt`] if it does not hold a valid record.
    pub async fn read(&self, id: &str) -> Result<AbstractRecord, CacheError> {
        let path = self.path_for(id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CacheError::io(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| CacheError::corrupt(&path, e))
    }

    /// Writes `record` under `id`, creating the cache directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory or file cannot be written.
    pub async fn write(&self, id: &str, record: &AbstractRecord) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        let path = self.path_for(id);
        let json = serde_json::to_vec_pretty(record).map_err(|e| CacheError::corrupt(&path, e))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| CacheError::io(&path, e))?;

        debug!(id, path = %path.display(), "cached abstract");
        Ok(())
    }
}

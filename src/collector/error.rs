//! Error types for identifier collection.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading source files or exporting URL lists.
///
/// During [`collect`](super::collect) these are logged and the offending
/// file is skipped; they only propagate from [`UrlSet::save`](super::UrlSet::save)
/// and [`collect_from_file`](super::collect_from_file).
#[derive(Debug, Error)]
pub enum CollectError {
    /// File could not be read or written.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// File content is not a valid question set.
    #[error("malformed source file {path}: {source}")]
    Malformed {
        /// The file path that failed to parse.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl CollectError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a malformed-file error.
    pub fn malformed(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Malformed {
            path: path.into(),
            source,
        }
    }
}

//! Identifier collection from question-set source files.
//!
//! Source files are JSON documents of the form
//!
//! ```json
//! { "questions": [ { "documents": ["http://www.ncbi.nlm.nih.gov/pubmed/15858239"] } ] }
//! ```
//!
//! Files are grouped by directory ([`SourceGroup`]); every `*.json` file in
//! each group contributes the document URLs of every question. The result is
//! a [`UrlSet`]: each URL appears once no matter how many questions or files
//! reference it.
//!
//! A file that is missing or malformed contributes nothing and is logged;
//! collection never fails as a whole.

mod error;
mod identifier;

pub use error::CollectError;
pub use identifier::extract_identifier;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

/// A named directory of question-set files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup {
    /// Label used in logs (e.g. `training`).
    pub name: String,
    /// Directory scanned for `*.json` files (non-recursive).
    pub dir: PathBuf,
}

impl SourceGroup {
    /// Creates a source group.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }

    /// Lists the group's `*.json` files in name order.
    ///
    /// A missing or unreadable directory yields an empty list.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(group = %self.name, dir = %self.dir.display(), error = %e, "cannot read source directory");
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        files.sort();
        files
    }
}

/// A deduplicated set of identifier-bearing URLs.
///
/// Iteration is in sorted order so logs and exports are reproducible; the
/// order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlSet {
    urls: BTreeSet<String>,
}

impl UrlSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a URL, returning `true` if it was not present.
    ///
    /// Surrounding whitespace is trimmed; blank strings are ignored.
    pub fn insert(&mut self, url: impl AsRef<str>) -> bool {
        let url = url.as_ref().trim();
        if url.is_empty() {
            return false;
        }
        self.urls.insert(url.to_string())
    }

    /// Adds every URL from another set.
    pub fn extend_from(&mut self, other: UrlSet) {
        self.urls.extend(other.urls);
    }

    /// Number of unique URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Returns true when the set holds no URLs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Returns true when the URL is present.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url.trim())
    }

    /// Iterates URLs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    /// Writes the URLs one per line, sorted, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Io`] when the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), CollectError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CollectError::io(parent, e))?;
        }
        let mut body = String::new();
        for url in &self.urls {
            body.push_str(url);
            body.push('\n');
        }
        fs::write(path, body).map_err(|e| CollectError::io(path, e))?;
        info!(count = self.len(), path = %path.display(), "saved unique URLs");
        Ok(())
    }
}

impl<S: AsRef<str>> FromIterator<S> for UrlSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for url in iter {
            set.insert(url);
        }
        set
    }
}

impl IntoIterator for UrlSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.into_iter()
    }
}

#[derive(Debug, Deserialize)]
struct QuestionFile {
    #[serde(default)]
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct Question {
    #[serde(default)]
    documents: Vec<String>,
}

/// Reads one question-set file and returns its document URLs.
///
/// # Errors
///
/// Returns [`CollectError::Io`] when the file cannot be read and
/// [`CollectError::Malformed`] when it is not a valid question set.
pub fn collect_from_file(path: &Path) -> Result<UrlSet, CollectError> {
    let content = fs::read_to_string(path).map_err(|e| CollectError::io(path, e))?;
    let parsed: QuestionFile =
        serde_json::from_str(&content).map_err(|e| CollectError::malformed(path, e))?;

    Ok(parsed
        .questions
        .into_iter()
        .flat_map(|question| question.documents)
        .collect())
}

/// Collects unique document URLs from every file in every group.
///
/// Files that fail to read or parse are logged and skipped.
#[must_use]
pub fn collect(groups: &[SourceGroup]) -> UrlSet {
    let mut unique = UrlSet::new();

    for group in groups {
        let files = group.files();
        info!(group = %group.name, files = files.len(), "scanning source group");

        for file in files {
            match collect_from_file(&file) {
                Ok(urls) => {
                    debug!(file = %file.display(), urls = urls.len(), "collected URLs from file");
                    unique.extend_from(urls);
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "skipping unreadable source file");
                }
            }
        }
    }

    info!(total = unique.len(), "collected unique document URLs");
    unique
}

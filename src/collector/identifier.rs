//! Identifier extraction from document-reference URLs.

use url::Url;

/// Extracts the identifier from a document URL: its trailing path segment.
///
/// Query strings, fragments and trailing slashes are ignored. Strings that
/// do not parse as URLs fall back to plain `/` splitting. Returns `None`
/// when the trailing segment is empty.
///
/// # Examples
///
/// ```
/// use harvester_core::collector::extract_identifier;
///
/// assert_eq!(
///     extract_identifier("http://www.ncbi.nlm.nih.gov/pubmed/15858239").as_deref(),
///     Some("15858239")
/// );
/// assert_eq!(extract_identifier("http://www.ncbi.nlm.nih.gov/pubmed/").as_deref(), None);
/// ```
#[must_use]
pub fn extract_identifier(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let segment = match Url::parse(trimmed) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(str::to_string),
        Err(_) => trimmed
            .split(['?', '#'])
            .next()
            .and_then(|path| path.split('/').filter(|s| !s.is_empty()).next_back())
            .map(str::to_string),
    };
    segment.filter(|s| !s.is_empty())
}

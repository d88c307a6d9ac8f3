//! The normalized abstract record produced by a fetch client.

use serde::{Deserialize, Serialize};

/// A normalized biomedical abstract.
///
/// Serialized as a flat JSON object. The abstract body is written under the
/// `abstract` key so cache files stay readable by downstream corpus tooling;
/// `abstract_text` is accepted on input as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractRecord {
    /// Provider identifier (PMID).
    pub id: String,
    /// Article title.
    pub title: String,
    /// Abstract body.
    #[serde(rename = "abstract", alias = "abstract_text")]
    pub abstract_text: String,
    /// Authors in publication order.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Free-form publication date as reported by the provider (e.g. `2004 Jul-Sep`).
    pub publication_date: String,
    /// Journal title.
    pub journal: String,
    /// DOI, when the provider reports one.
    #[serde(default)]
    pub doi: Option<String>,
    /// Keywords without duplicates.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// MeSH headings in provider order.
    #[serde(default)]
    pub mesh_terms: Vec<String>,
}

impl AbstractRecord {
    /// Creates a record with the given id and title and empty optional fields.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: String::new(),
            authors: Vec::new(),
            publication_date: String::new(),
            journal: String::new(),
            doi: None,
            keywords: Vec::new(),
            mesh_terms: Vec::new(),
        }
    }
}

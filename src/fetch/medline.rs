//! MEDLINE text format parsing.
//!
//! E-utilities returns `rettype=medline` as tagged lines:
//!
//! ```text
//! PMID- 15858239
//! TI  - The role of ret gene in the pathogenesis of Hirschsprung
//!       disease.
//! AU  - Smigiel R
//! ```
//!
//! A tag occupies the first four columns, followed by `- `. Lines starting
//! with six spaces continue the previous field. Records are separated by
//! blank lines.

use super::AbstractRecord;

const NO_TITLE: &str = "No title available";
const NO_ABSTRACT: &str = "No abstract available";
const UNKNOWN_DATE: &str = "Unknown";
const UNKNOWN_JOURNAL: &str = "Unknown journal";

/// One raw MEDLINE record: tag/value pairs in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedlineRecord {
    fields: Vec<(String, String)>,
}

impl MedlineRecord {
    /// Returns the first value for `tag`.
    #[must_use]
    pub fn first(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for `tag` in document order.
    pub fn all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(t, _)| t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true when no fields were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Converts into an [`AbstractRecord`], using `fallback_id` when the
    /// record has no `PMID` line.
    #[must_use]
    pub fn into_abstract(self, fallback_id: &str) -> AbstractRecord {
        let mesh_terms: Vec<String> = self.all("MH").map(str::to_string).collect();
        let other_terms: Vec<String> = self.all("OT").map(str::to_string).collect();
        let keywords = if other_terms.is_empty() {
            dedup(mesh_terms.clone())
        } else {
            dedup(other_terms)
        };

        AbstractRecord {
            id: self.first("PMID").unwrap_or(fallback_id).to_string(),
            title: self.first("TI").unwrap_or(NO_TITLE).to_string(),
            abstract_text: self.first("AB").unwrap_or(NO_ABSTRACT).to_string(),
            authors: self.all("AU").map(str::to_string).collect(),
            publication_date: self.first("DP").unwrap_or(UNKNOWN_DATE).to_string(),
            journal: self.first("JT").unwrap_or(UNKNOWN_JOURNAL).to_string(),
            doi: self.doi(),
            keywords,
            mesh_terms,
        }
    }

    fn doi(&self) -> Option<String> {
        self.all("LID")
            .chain(self.all("AID"))
            .find_map(|value| value.strip_suffix("[doi]"))
            .map(|doi| doi.trim().to_string())
    }
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Splits a MEDLINE document into records.
///
/// Lines that are neither tagged nor continuations are ignored. Records
/// with no fields are dropped.
#[must_use]
pub fn parse_records(text: &str) -> Vec<MedlineRecord> {
    let mut records = Vec::new();
    let mut current = MedlineRecord::default();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("      ") {
            if let Some((_, value)) = current.fields.last_mut() {
                value.push(' ');
                value.push_str(rest.trim());
            }
            continue;
        }

        if let Some((tag, value)) = split_tagged_line(line) {
            current.fields.push((tag.to_string(), value.to_string()));
        }
    }

    if !current.is_empty() {
        records.push(current);
    }
    records
}

fn split_tagged_line(line: &str) -> Option<(&str, &str)> {
    let tag = line.get(..4)?;
    if line.get(4..6)? != "- " {
        return None;
    }
    let tag = tag.trim_end();
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return None;
    }
    Some((tag, line.get(6..).unwrap_or("").trim()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\nPMID- 15858239\nOWN - NLM\nDP  - 2004 Jul-Sep\nTI  - The role of ret gene in the pathogenesis of Hirschsprung\n      disease.\nLID - S0000-0000(04)00001-1 [pii]\nLID - 10.1000/test.12345 [doi]\nAB  - This is a test abstract about Hirschsprung disease and the RET\n      gene.\nAU  - Smigiel R\nAU  - Patkowski D\nJT  - Med Wieku Rozwoj\nMH  - Chromosome Aberrations\nMH  - Hirschsprung Disease/genetics\nMH  - Humans\n\nPMID- 11111111\nTI  - Second record\n";

    #[test]
    fn test_parse_records_splits_on_blank_lines() {
        let records = parse_records(SAMPLE);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].first("PMID"), Some("11111111"));
    }

    #[test]
    fn test_continuation_lines_are_joined() {
        let records = parse_records(SAMPLE);
        assert_eq!(
            records[0].first("TI"),
            Some("The role of ret gene in the pathogenesis of Hirschsprung disease.")
        );
    }

    #[test]
    fn test_into_abstract_maps_fields() {
        let record = parse_records(SAMPLE).remove(0).into_abstract("fallback");
        assert_eq!(record.id, "15858239");
        assert_eq!(record.authors, vec!["Smigiel R", "Patkowski D"]);
        assert_eq!(record.publication_date, "2004 Jul-Sep");
        assert_eq!(record.journal, "Med Wieku Rozwoj");
        assert_eq!(record.doi.as_deref(), Some("10.1000/test.12345"));
        assert_eq!(record.mesh_terms.len(), 3);
        // No OT lines, so keywords fall back to MeSH headings.
        assert_eq!(record.keywords, record.mesh_terms);
    }

    #[test]
    fn test_into_abstract_defaults_for_missing_fields() {
        let record = parse_records("PMID- 42\n").remove(0).into_abstract("x");
        assert_eq!(record.title, NO_TITLE);
        assert_eq!(record.abstract_text, NO_ABSTRACT);
        assert_eq!(record.publication_date, UNKNOWN_DATE);
        assert_eq!(record.journal, UNKNOWN_JOURNAL);
        assert_eq!(record.doi, None);
        assert!(record.authors.is_empty());
    }

    #[test]
    fn test_into_abstract_uses_fallback_id() {
        let record = parse_records("TI  - Untagged\n").remove(0).into_abstract("777");
        assert_eq!(record.id, "777");
    }

    #[test]
    fn test_other_terms_become_keywords_without_duplicates() {
        let text = "PMID- 1\nOT  - genetics\nOT  - RET\nOT  - genetics\nMH  - Humans\n";
        let record = parse_records(text).remove(0).into_abstract("1");
        assert_eq!(record.keywords, vec!["genetics", "RET"]);
        assert_eq!(record.mesh_terms, vec!["Humans"]);
    }

    #[test]
    fn test_doi_from_aid_when_lid_missing() {
        let text = "PMID- 1\nAID - 10.5555/abc [doi]\n";
        let record = parse_records(text).remove(0).into_abstract("1");
        assert_eq!(record.doi.as_deref(), Some("10.5555/abc"));
    }

    #[test]
    fn test_empty_document_has_no_records() {
        assert!(parse_records("\n\n").is_empty());
        assert!(parse_records("").is_empty());
    }
}

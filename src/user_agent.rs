//! Shared User-Agent string for outbound HTTP clients.
//!
//! NCBI asks E-utilities callers to identify themselves; the `tool` and
//! `email` query parameters carry the formal identity, the User-Agent
//! carries the crate name and version.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/abstract-harvester";

/// Default User-Agent for provider requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("abstract-harvester/{version} (academic-research-tool; +{PROJECT_UA_URL})")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL");
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("abstract-harvester/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
            "UA must contain crate version"
        );
        assert!(ua.contains("academic-research-tool"));
    }
}

//! NCBI E-utilities binding for [`AbstractSource`].
//!
//! Fetches MEDLINE text through `efetch.fcgi` and maps HTTP outcomes onto
//! the [`FetchError`] taxonomy:
//!
//! | Outcome | Error |
//! |---------|-------|
//! | 429 | `RateLimited` (with `Retry-After` when sent) |
//! | other 4xx | `ClientError(status)` |
//! | 5xx, timeout, connect, body read | `Unexpected` |
//! | 200 with no record | `ClientError` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use super::medline::parse_records;
use super::{AbstractRecord, AbstractSource, FetchError, ensure_record_count};
use crate::harvest::parse_retry_after;
use crate::user_agent;

/// Default E-utilities base URL.
pub const DEFAULT_EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Default `tool` parameter reported to NCBI.
pub const DEFAULT_TOOL_NAME: &str = "abstract-harvester";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 60;

/// Identity and endpoint settings for [`EntrezClient`].
#[derive(Clone)]
pub struct EntrezConfig {
    /// Contact email NCBI requires for E-utilities callers.
    pub email: String,
    /// Optional API key raising the allowed request rate.
    pub api_key: Option<String>,
    /// Tool name reported with every request.
    pub tool: String,
    /// E-utilities base URL (overridable for tests).
    pub base_url: String,
}

impl EntrezConfig {
    /// Creates a config with the default tool name and endpoint.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_key: None,
            tool: DEFAULT_TOOL_NAME.to_string(),
            base_url: DEFAULT_EUTILS_BASE_URL.to_string(),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    /// Sets the tool name.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl std::fmt::Debug for EntrezConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntrezConfig")
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("tool", &self.tool)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Fetch client backed by NCBI E-utilities `efetch`.
#[derive(Debug, Clone)]
pub struct EntrezClient {
    client: Client,
    config: EntrezConfig,
}

impl EntrezClient {
    /// Creates a client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] when the HTTP client cannot be built.
    pub fn new(config: EntrezConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &EntrezConfig {
        &self.config
    }

    fn efetch_url(&self, ids: &str, label: &str) -> Result<Url, FetchError> {
        let endpoint = format!("{}/efetch.fcgi", self.config.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&endpoint)
            .map_err(|e| FetchError::unexpected(label, format!("invalid E-utilities URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("db", "pubmed")
                .append_pair("id", ids)
                .append_pair("rettype", "medline")
                .append_pair("retmode", "text")
                .append_pair("tool", &self.config.tool)
                .append_pair("email", &self.config.email);
            if let Some(api_key) = &self.config.api_key {
                query.append_pair("api_key", api_key);
            }
        }
        Ok(url)
    }

    /// Issues one efetch request and returns the MEDLINE body.
    async fn efetch(&self, ids: &str, label: &str) -> Result<String, FetchError> {
        let url = self.efetch_url(ids, label)?;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent::default_user_agent())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::unexpected(label, "request timed out")
                } else {
                    FetchError::unexpected(label, format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            warn!(id = label, ?retry_after, "provider rate limit hit");
            return Err(FetchError::rate_limited_with_retry_after(
                label,
                status.as_u16(),
                retry_after,
            ));
        }
        if status.is_client_error() {
            return Err(FetchError::client_status(
                label,
                status.as_u16(),
                "provider rejected the request",
            ));
        }
        if !status.is_success() {
            return Err(FetchError::unexpected(
                label,
                format!("provider returned HTTP {}", status.as_u16()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::unexpected(label, format!("failed to read response body: {e}")))
    }
}

#[async_trait]
impl AbstractSource for EntrezClient {
    fn name(&self) -> &'static str {
        "entrez"
    }

    #[instrument(skip(self), fields(source = "entrez"))]
    async fn get_by_id(&self, id: &str) -> Result<AbstractRecord, FetchError> {
        let body = self.efetch(id, id).await?;
        let Some(record) = parse_records(&body).into_iter().next() else {
            return Err(FetchError::client(id, "no abstract found"));
        };
        debug!(id, "parsed MEDLINE record");
        Ok(record.into_abstract(id))
    }

    #[instrument(skip(self, ids), fields(source = "entrez", count = ids.len()))]
    async fn get_many(&self, ids: &[String]) -> Result<Vec<AbstractRecord>, FetchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let label = ids.first().map_or("", String::as_str);
        let body = self.efetch(&joined, label).await?;
        let parsed = parse_records(&body);
        if parsed.len() != ids.len() {
            let records = parsed.into_iter().map(|r| r.into_abstract("")).collect();
            return ensure_record_count(ids, records);
        }
        Ok(parsed
            .into_iter()
            .zip(ids)
            .map(|(record, id)| record.into_abstract(id))
            .collect())
    }
}

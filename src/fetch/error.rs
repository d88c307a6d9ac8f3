//! Error taxonomy for fetch clients.
//!
//! Every failure a fetch client reports falls into exactly one of three
//! classes, and the class alone decides how the harvest engine reacts:
//!
//! | Variant | Engine reaction |
//! |---------|-----------------|
//! | [`FetchError::RateLimited`] | retry, exponential backoff |
//! | [`FetchError::ClientError`] | permanent, never retried |
//! | [`FetchError::Unexpected`] | retry, linear backoff |

use std::time::Duration;

use thiserror::Error;

/// Errors returned by an [`AbstractSource`](super::AbstractSource).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The provider explicitly asked us to slow down (HTTP 429 or equivalent).
    #[error("rate limited by provider (HTTP {status}) fetching {id}")]
    RateLimited {
        /// Identifier being fetched.
        id: String,
        /// Status code reported by the provider.
        status: u16,
        /// Server-suggested wait, parsed from `Retry-After` when present.
        retry_after: Option<Duration>,
    },

    /// The identifier has no valid answer (no record, bad request).
    #[error("{}", client_error_message(.id, .status, .message))]
    ClientError {
        /// Identifier being fetched.
        id: String,
        /// HTTP status when the failure came from a response.
        status: Option<u16>,
        /// Human-readable detail.
        message: String,
    },

    /// Transport failure, server error, or anything else not classified above.
    #[error("unexpected error fetching {id}: {message}")]
    Unexpected {
        /// Identifier being fetched.
        id: String,
        /// Human-readable detail.
        message: String,
    },
}

fn client_error_message(id: &str, status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("client error (HTTP {status}) fetching {id}: {message}"),
        None => format!("client error fetching {id}: {message}"),
    }
}

impl FetchError {
    /// Creates a rate-limit error with the conventional 429 status.
    pub fn rate_limited(id: impl Into<String>) -> Self {
        Self::RateLimited {
            id: id.into(),
            status: 429,
            retry_after: None,
        }
    }

    /// Creates a rate-limit error carrying a server-suggested wait.
    pub fn rate_limited_with_retry_after(
        id: impl Into<String>,
        status: u16,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::RateLimited {
            id: id.into(),
            status,
            retry_after,
        }
    }

    /// Creates a client error without an HTTP status.
    pub fn client(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientError {
            id: id.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Creates a client error from an HTTP status.
    pub fn client_status(id: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::ClientError {
            id: id.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates an unclassified error.
    pub fn unexpected(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unexpected {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Returns the identifier the error refers to.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::RateLimited { id, .. } | Self::ClientError { id, .. } | Self::Unexpected { id, .. } => {
                id
            }
        }
    }

    /// Returns the HTTP status, if the failure came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { status, .. } => Some(*status),
            Self::ClientError { status, .. } => *status,
            Self::Unexpected { .. } => None,
        }
    }

    /// Returns the server-suggested wait for rate-limit errors.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

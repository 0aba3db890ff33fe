//! # Source Traits
//!
//! Two collaborators sit behind the runtime:
//!
//! - [`GenerationSource`] streams answer fragments for a composed
//!   [`GenerationRequest`]. It never fails: a source that hits an error yields
//!   one fallback fragment instead (see [`crate::fallback`]).
//! - [`DistillationSource`] answers a single prompt in one shot and reports
//!   failures as [`ProviderError`], which the caller classifies with
//!   [`ProviderError::is_rate_limited`].

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::request::GenerationRequest;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Infallible stream of text fragments handed to the aggregator.
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Fallible fragment stream produced by a transport before the fallback
/// wrapper is applied.
pub type RawFragmentStream = Pin<Box<dyn Stream<Item = ProviderResult<String>> + Send>>;

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SSE stream parsing failed.
    #[error("SSE parse error: {message}")]
    SseParse {
        /// Error description.
        message: String,
    },

    /// No credentials configured.
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rejected for request volume.
    #[error("Rate limited (429): {message}")]
    RateLimited {
        /// Suggested retry delay in milliseconds (0 when unknown).
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Provider-specific error code.
        code: Option<String>,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The provider answered but produced no usable text.
    #[error("empty response")]
    EmptyResponse,

    /// Stream was cancelled.
    #[error("Stream cancelled")]
    Cancelled,

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether this error signals request-volume rejection.
    ///
    /// True for [`Self::RateLimited`], an HTTP 429, a `RESOURCE_EXHAUSTED`
    /// API code, or any error whose text carries a `429` marker.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status: 429, .. } => true,
            Self::Api {
                code: Some(code), ..
            } if code == "RESOURCE_EXHAUSTED" => true,
            Self::Http(e) if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) => true,
            Self::Cancelled | Self::EmptyResponse => false,
            other => other.to_string().contains("429"),
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::SseParse { .. }
            | Self::Auth { .. }
            | Self::EmptyResponse
            | Self::Cancelled
            | Self::Json(_)
            | Self::Other { .. } => false,
        }
    }

    /// Error category string for logs and metrics labels.
    pub fn category(&self) -> &'static str {
        if self.is_rate_limited() {
            return "rate_limit";
        }
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::SseParse { .. } => "parse",
            Self::Auth { .. } => "auth",
            Self::Api { .. } | Self::RateLimited { .. } => "api",
            Self::EmptyResponse => "empty",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Streams answer fragments for one send.
///
/// Implementors must stop yielding once `cancel` fires, and must convert
/// their own failures into a single fallback fragment rather than ending
/// with an error.
#[async_trait]
pub trait GenerationSource: Send + Sync {
    /// Short identifier for logs (e.g. `"google"`).
    fn name(&self) -> &str;

    /// Start streaming a response to `request`.
    async fn stream(&self, request: &GenerationRequest, cancel: CancellationToken)
    -> FragmentStream;
}

/// Answers one distillation prompt.
#[async_trait]
pub trait DistillationSource: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Return the raw model text for `prompt`.
    async fn distill(&self, prompt: &str) -> ProviderResult<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: Option<&str>, message: &str) -> ProviderError {
        ProviderError::Api {
            status,
            message: message.into(),
            code: code.map(String::from),
            retryable: status == 429 || status >= 500,
        }
    }

    #[test]
    fn rate_limited_variant_classifies() {
        let err = ProviderError::RateLimited {
            retry_after_ms: 0,
            message: "slow down".into(),
        };
        assert!(err.is_rate_limited());
        assert!(err.is_retryable());
        assert_eq!(err.category(), "rate_limit");
    }

    #[test]
    fn resource_exhausted_classifies() {
        let err = api(400, Some("RESOURCE_EXHAUSTED"), "quota");
        assert!(err.is_rate_limited());
    }

    #[test]
    fn status_429_classifies() {
        assert!(api(429, None, "too many").is_rate_limited());
    }

    #[test]
    fn marker_in_free_text_classifies() {
        let err = ProviderError::Other {
            message: "got status 429 from upstream".into(),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.category(), "rate_limit");
    }

    #[test]
    fn ordinary_errors_are_not_rate_limited() {
        let err = api(500, Some("INTERNAL"), "boom");
        assert!(!err.is_rate_limited());
        assert!(err.is_retryable());
        assert_eq!(err.category(), "api");

        assert!(!ProviderError::EmptyResponse.is_rate_limited());
        assert!(!ProviderError::Cancelled.is_rate_limited());
        assert_eq!(ProviderError::Cancelled.category(), "cancelled");
    }

    #[test]
    fn sse_parse_is_not_retryable() {
        let err = ProviderError::SseParse {
            message: "connection reset".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "parse");
    }
}

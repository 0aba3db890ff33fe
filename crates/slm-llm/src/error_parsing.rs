//! API error response parsing.
//!
//! Handles the envelopes an HTTP error body may carry:
//! - Google: `{"error": {"code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED"}}`
//! - Typed:  `{"error": {"message": "...", "type": "..."}}`
//! - Flat:   `{"message": "...", "code": "..."}`

use serde_json::Value;

use crate::provider::ProviderError;

/// Parsed API error information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiErrorInfo {
    /// Human-readable error message.
    pub message: String,
    /// Provider-specific error code (e.g. `"RESOURCE_EXHAUSTED"`).
    pub code: Option<String>,
    /// Whether the request can be retried (429 or 5xx).
    pub retryable: bool,
}

impl ApiErrorInfo {
    /// Convert into a [`ProviderError`], using the rate-limit variant for 429
    /// and `RESOURCE_EXHAUSTED`.
    pub fn into_provider_error(self, status: u16, retry_after_ms: Option<u64>) -> ProviderError {
        if status == 429 || self.code.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return ProviderError::RateLimited {
                retry_after_ms: retry_after_ms.unwrap_or(0),
                message: self.message,
            };
        }
        ProviderError::Api {
            status,
            message: self.message,
            code: self.code,
            retryable: self.retryable,
        }
    }
}

/// Parse an API error body, falling back to the raw text.
pub fn parse_api_error(body: &str, status: u16) -> ApiErrorInfo {
    let retryable = status == 429 || status >= 500;

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = json["error"]["message"].as_str() {
            let code = json["error"]["status"]
                .as_str()
                .or_else(|| json["error"]["type"].as_str())
                .map(String::from);
            return ApiErrorInfo {
                message: msg.to_string(),
                code,
                retryable,
            };
        }

        if let Some(msg) = json["message"].as_str() {
            return ApiErrorInfo {
                message: msg.to_string(),
                code: json["code"].as_str().map(String::from),
                retryable,
            };
        }
    }

    ApiErrorInfo {
        message: format!("HTTP {status}: {body}"),
        code: None,
        retryable,
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after_secs(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|s| s.saturating_mul(1000))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

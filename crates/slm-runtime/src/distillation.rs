//! Logic distillation: one-shot extraction of a single rule from the
//! conversation.
//!
//! The caller appends the returned rule; this module never touches the rule
//! set itself.

use slm_core::constants::{DISTILLATION_FAILED_NOTICE, EMPTY_HISTORY_NOTICE, RATE_LIMITED_NOTICE};
use slm_core::documents::Document;
use slm_core::messages::Message;
use slm_llm::DistillationSource;
use slm_llm::context_composition::build_distillation_prompt;
use tracing::{error, info, instrument};

/// Classified distillation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistillationError {
    /// Rejected before any request was built.
    #[error("{}", EMPTY_HISTORY_NOTICE)]
    EmptyHistory,

    /// The source rejected the request for volume.
    #[error("{}", RATE_LIMITED_NOTICE)]
    RateLimited {
        /// Provider message, for logs.
        message: String,
    },

    /// Anything else, including an empty answer.
    #[error("{}", DISTILLATION_FAILED_NOTICE)]
    Generic {
        /// Underlying cause, for logs.
        message: String,
    },
}

impl DistillationError {
    /// Whether this is the rate-limit class.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Underlying cause, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::EmptyHistory => None,
            Self::RateLimited { message } | Self::Generic { message } => Some(message),
        }
    }

    /// Category label for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptyHistory => "empty_history",
            Self::RateLimited { .. } => "rate_limited",
            Self::Generic { .. } => "generic",
        }
    }
}

/// Ask `source` for one new rule distilled from `messages` and `documents`.
///
/// Fails with [`DistillationError::EmptyHistory`] before building a prompt
/// when there are no messages.
#[instrument(skip_all, fields(source = source.name(), messages = messages.len()))]
pub async fn distill_rule(
    source: &dyn DistillationSource,
    messages: &[Message],
    documents: &[Document],
) -> Result<String, DistillationError> {
    if messages.is_empty() {
        return Err(DistillationError::EmptyHistory);
    }

    let prompt = build_distillation_prompt(messages, documents);
    let result = match source.distill(&prompt).await {
        Ok(raw) => clean_rule(&raw).ok_or_else(|| DistillationError::Generic {
            message: "model returned an empty rule".into(),
        }),
        Err(e) if e.is_rate_limited() => Err(DistillationError::RateLimited {
            message: e.to_string(),
        }),
        Err(e) => Err(DistillationError::Generic {
            message: e.to_string(),
        }),
    };

    match &result {
        Ok(rule) => info!(rule_len = rule.len(), "rule distilled"),
        Err(e) => error!(
            category = e.category(),
            error = e.detail().unwrap_or_default(),
            "distillation failed"
        ),
    }
    let outcome = result.as_ref().map_or_else(DistillationError::category, |_| "ok");
    metrics::counter!("slm_distillations_total", "outcome" => outcome).increment(1);
    result
}

/// Trim, strip one matching pair of surrounding quotes, and reject empties.
fn clean_rule(raw: &str) -> Option<String> {
    let rule = strip_matching_quotes(raw.trim()).trim();
    (!rule.is_empty()).then(|| rule.to_owned())
}

/// Remove exactly one pair of matching `"` or `'` around `s`.
pub fn strip_matching_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use slm_core::messages::Part;
    use slm_llm::{ProviderError, ProviderResult};

    use super::*;

    struct Scripted {
        reply: fn() -> ProviderResult<String>,
        calls: AtomicUsize,
        last_prompt: parking_lot::Mutex<String>,
    }

    impl Scripted {
        fn new(reply: fn() -> ProviderResult<String>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                last_prompt: parking_lot::Mutex::new(String::new()),
            }
        }
    }

    #[async_trait]
    impl DistillationSource for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn distill(&self, prompt: &str) -> ProviderResult<String> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock() = prompt.to_owned();
            (self.reply)()
        }
    }

    fn history() -> Vec<Message> {
        vec![Message::user(vec![Part::text("always cite page numbers")])]
    }

    // ── strip_matching_quotes ────────────────────────────────────────────

    #[test]
    fn strips_one_matching_pair_only() {
        assert_eq!(strip_matching_quotes("\"rule\""), "rule");
        assert_eq!(strip_matching_quotes("'rule'"), "rule");
        assert_eq!(strip_matching_quotes("\"\"rule\"\""), "\"rule\"");
        assert_eq!(strip_matching_quotes("\"rule'"), "\"rule'");
        assert_eq!(strip_matching_quotes("rule"), "rule");
        assert_eq!(strip_matching_quotes("\""), "\"");
    }

    // ── distill_rule ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_history_rejected_before_request() {
        let source = Scripted::new(|| Ok("unused".into()));
        let err = distill_rule(&source, &[], &[]).await.unwrap_err();
        assert_eq!(err, DistillationError::EmptyHistory);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(source.last_prompt.lock().is_empty());
    }

    #[tokio::test]
    async fn success_trims_and_unquotes() {
        let source = Scripted::new(|| Ok("  \"Always cite page numbers.\"\n".into()));
        let rule = distill_rule(&source, &history(), &[Document::new("a.txt", "body")])
            .await
            .unwrap();
        assert_eq!(rule, "Always cite page numbers.");

        let prompt = source.last_prompt.lock().clone();
        assert!(prompt.contains("User: \"always cite page numbers\""));
        assert!(prompt.contains("File Name: a.txt"));
    }

    #[tokio::test]
    async fn blank_answer_is_generic_failure() {
        let source = Scripted::new(|| Ok("   ".into()));
        let err = distill_rule(&source, &history(), &[]).await.unwrap_err();
        assert_matches!(err, DistillationError::Generic { .. });
        assert_eq!(err.to_string(), DISTILLATION_FAILED_NOTICE);
    }

    #[tokio::test]
    async fn rate_limit_marker_is_classified() {
        let source = Scripted::new(|| {
            Err(ProviderError::Other {
                message: "[429 Too Many Requests] quota".into(),
            })
        });
        let err = distill_rule(&source, &history(), &[]).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(err.to_string(), RATE_LIMITED_NOTICE);
    }

    #[tokio::test]
    async fn rate_limited_variant_is_classified() {
        let source = Scripted::new(|| {
            Err(ProviderError::RateLimited {
                retry_after_ms: 0,
                message: "slow down".into(),
            })
        });
        let err = distill_rule(&source, &history(), &[]).await.unwrap_err();
        assert_matches!(err, DistillationError::RateLimited { .. });
    }

    #[tokio::test]
    async fn other_failures_are_generic() {
        let source = Scripted::new(|| Err(ProviderError::EmptyResponse));
        let err = distill_rule(&source, &history(), &[]).await.unwrap_err();
        assert_matches!(err, DistillationError::Generic { .. });
        assert!(!err.is_rate_limited());
    }
}

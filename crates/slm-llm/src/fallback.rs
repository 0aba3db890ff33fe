//! Fallback fragment wrapper.
//!
//! A [`GenerationSource`](crate::GenerationSource) must never end a stream
//! with an error. [`with_fallback`] adapts a fallible transport stream:
//! fragments pass through untouched, and the first failure (at connect time
//! or mid-stream) is replaced by exactly one
//! [`GENERATION_FALLBACK_FRAGMENT`], after which the stream ends.

use futures::StreamExt;
use slm_core::constants::GENERATION_FALLBACK_FRAGMENT;
use tracing::error;

use crate::provider::{FragmentStream, ProviderError, ProviderResult, RawFragmentStream};

fn report(source: &str, err: &ProviderError) {
    error!(source = source, category = err.category(), error = %err, "generation source failed");
    metrics::counter!("slm_provider_errors_total", "category" => err.category()).increment(1);
}

/// Wrap a transport result so every failure becomes one fallback fragment.
///
/// [`ProviderError::Cancelled`] ends the stream quietly.
pub fn with_fallback(source: &str, inner: ProviderResult<RawFragmentStream>) -> FragmentStream {
    let source = source.to_owned();
    Box::pin(async_stream::stream! {
        let mut inner = match inner {
            Ok(s) => s,
            Err(ProviderError::Cancelled) => return,
            Err(e) => {
                report(&source, &e);
                yield GENERATION_FALLBACK_FRAGMENT.to_string();
                return;
            }
        };
        while let Some(item) = inner.next().await {
            match item {
                Ok(fragment) => yield fragment,
                Err(ProviderError::Cancelled) => return,
                Err(e) => {
                    report(&source, &e);
                    yield GENERATION_FALLBACK_FRAGMENT.to_string();
                    return;
                }
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(items: Vec<ProviderResult<String>>) -> ProviderResult<RawFragmentStream> {
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn other(msg: &str) -> ProviderError {
        ProviderError::Other {
            message: msg.into(),
        }
    }

    #[tokio::test]
    async fn passes_fragments_through() {
        let out: Vec<String> =
            with_fallback("t", raw(vec![Ok("a".into()), Ok("b".into())])).collect().await;
        assert_eq!(out, ["a", "b"]);
    }

    #[tokio::test]
    async fn connect_failure_yields_single_fallback() {
        let out: Vec<String> = with_fallback("t", Err(other("refused"))).collect().await;
        assert_eq!(out, [GENERATION_FALLBACK_FRAGMENT]);
    }

    #[tokio::test]
    async fn mid_stream_failure_appends_fallback_and_stops() {
        let out: Vec<String> = with_fallback(
            "t",
            raw(vec![Ok("partial ".into()), Err(other("reset")), Ok("lost".into())]),
        )
        .collect()
        .await;
        assert_eq!(out, ["partial ".to_string(), GENERATION_FALLBACK_FRAGMENT.to_string()]);
    }

    #[tokio::test]
    async fn cancellation_ends_quietly() {
        let out: Vec<String> =
            with_fallback("t", raw(vec![Ok("a".into()), Err(ProviderError::Cancelled)]))
                .collect()
                .await;
        assert_eq!(out, ["a"]);
    }
}

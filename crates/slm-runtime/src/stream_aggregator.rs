//! Stream aggregator: drives a fragment stream into a model message.
//!
//! A send goes through three calls:
//!
//! 1. [`publish_placeholder`] appends an empty model message so the store
//!    shows a pending turn before any fragment arrives.
//! 2. [`aggregate`] applies fragments in arrival order to the first text
//!    part, republishing the whole message after each one. Cancellation is
//!    checked before every fragment.
//! 3. [`settle`] runs the citation decoder exactly once on the captured
//!    buffer and publishes the settled message.
//!
//! Republishing uses update-only semantics: if the message was deleted
//! mid-stream it stays deleted.

use futures::StreamExt;
use parking_lot::Mutex;
use slm_core::events::SessionEvent;
use slm_core::messages::Message;
use slm_llm::FragmentStream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::citations::{self, CitationOutcome};
use crate::event_emitter::EventEmitter;
use crate::message_store::MessageStore;

/// What [`aggregate`] captured from the stream.
#[derive(Clone, Debug)]
pub struct Aggregation {
    /// Working copy of the model message with all applied fragments.
    pub message: Message,
    /// Concatenated fragments.
    pub buffer: String,
    /// Whether the token fired before the stream ended.
    pub cancelled: bool,
    /// Fragments applied.
    pub fragment_count: usize,
    /// Time to first fragment, if any arrived.
    pub ttft_ms: Option<u64>,
}

/// Append and announce the placeholder model message.
pub fn publish_placeholder(store: &Mutex<MessageStore>, emitter: &EventEmitter) -> Message {
    let placeholder = Message::model_placeholder();
    store.lock().append(placeholder.clone());
    let _ = emitter.emit(SessionEvent::GenerationStarted {
        message_id: placeholder.id.clone(),
    });
    placeholder
}

/// Consume `stream`, applying each fragment to `message` and republishing it.
#[allow(clippy::cast_possible_truncation)]
#[instrument(skip_all, fields(message_id = %message.id))]
pub async fn aggregate(
    mut message: Message,
    mut stream: FragmentStream,
    store: &Mutex<MessageStore>,
    cancel: &CancellationToken,
) -> Aggregation {
    let started = Instant::now();
    let mut buffer = String::with_capacity(4096);
    let mut fragment_count = 0;
    let mut ttft_ms = None;
    let mut detached = false;

    let cancelled = loop {
        // biased: a stop must win over a fragment that is already ready
        let fragment = tokio::select! {
            biased;
            () = cancel.cancelled() => break true,
            fragment = stream.next() => fragment,
        };
        let Some(fragment) = fragment else {
            break false;
        };

        if ttft_ms.is_none() {
            ttft_ms = Some(started.elapsed().as_millis() as u64);
        }
        fragment_count += 1;
        buffer.push_str(&fragment);
        message.append_text(&fragment);

        if !detached && !store.lock().update(message.clone()) {
            warn!("model message removed mid-stream; no longer republishing");
            detached = true;
        }
    };

    debug!(fragment_count, cancelled, "stream drained");
    Aggregation {
        message,
        buffer,
        cancelled,
        fragment_count,
        ttft_ms,
    }
}

/// Decode the captured buffer and publish the settled message.
///
/// `started` is the moment the send began. If the message was deleted the
/// store is left untouched, but the settled form is still returned.
#[allow(clippy::cast_possible_truncation)]
pub fn settle(
    aggregation: Aggregation,
    store: &Mutex<MessageStore>,
    emitter: &EventEmitter,
    started: Instant,
) -> Message {
    let Aggregation {
        mut message,
        buffer,
        cancelled,
        ..
    } = aggregation;

    let decoded = citations::decode(&buffer, cancelled);
    let outcome = decoded.outcome;
    let generation_time_ms = started.elapsed().as_millis() as u64;
    citations::finalize(&mut message, decoded, generation_time_ms);

    let published = store.lock().update(message.clone());
    if published {
        let _ = emitter.emit(SessionEvent::GenerationSettled {
            message_id: message.id.clone(),
            cancelled,
            generation_time_ms,
        });
    }

    record_metrics(outcome, cancelled, generation_time_ms);
    debug!(
        message_id = %message.id,
        citations = outcome.as_str(),
        cancelled,
        generation_time_ms,
        published,
        "generation settled"
    );
    message
}

#[allow(clippy::cast_precision_loss)]
fn record_metrics(outcome: CitationOutcome, cancelled: bool, generation_time_ms: u64) {
    metrics::counter!("slm_generations_total").increment(1);
    if cancelled {
        metrics::counter!("slm_generations_cancelled_total").increment(1);
    }
    if outcome == CitationOutcome::Malformed {
        metrics::counter!("slm_citation_parse_failures_total").increment(1);
    }
    metrics::histogram!("slm_generation_duration_ms").record(generation_time_ms as f64);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use slm_core::constants::GENERATION_STOPPED_SUFFIX;
    use slm_core::messages::{Citation, Part, Role};

    use super::*;

    fn setup() -> (Arc<EventEmitter>, Mutex<MessageStore>) {
        let emitter = Arc::new(EventEmitter::new());
        let store = Mutex::new(MessageStore::new(Arc::clone(&emitter)));
        (emitter, store)
    }

    fn fragments(items: &[&str]) -> FragmentStream {
        let owned: Vec<String> = items.iter().map(|s| (*s).to_owned()).collect();
        Box::pin(futures::stream::iter(owned))
    }

    #[test]
    fn placeholder_is_empty_model_message() {
        let (emitter, store) = setup();
        let mut rx = emitter.subscribe();

        let placeholder = publish_placeholder(&store, &emitter);
        assert_eq!(placeholder.role, Role::Model);
        assert!(placeholder.parts.is_empty());
        assert_eq!(store.lock().len(), 1);

        assert_eq!(rx.try_recv().unwrap().event_type(), "message_appended");
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::GenerationStarted {
                message_id: placeholder.id
            }
        );
    }

    #[tokio::test]
    async fn fragments_accumulate_in_order_with_full_snapshots() {
        let (emitter, store) = setup();
        let placeholder = publish_placeholder(&store, &emitter);
        let mut rx = emitter.subscribe();

        let agg = aggregate(
            placeholder.clone(),
            fragments(&["Hel", "lo", " world"]),
            &store,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(agg.buffer, "Hello world");
        assert_eq!(agg.fragment_count, 3);
        assert!(!agg.cancelled);

        let snapshots: Vec<String> = (0..3)
            .map(|_| match rx.try_recv().unwrap() {
                SessionEvent::MessageUpdated { message } => message.first_text().to_owned(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(snapshots, ["Hel", "Hello", "Hello world"]);
        assert_eq!(store.lock().get(&placeholder.id).unwrap().first_text(), "Hello world");
    }

    #[tokio::test]
    async fn zero_fragments_is_valid() {
        let (emitter, store) = setup();
        let placeholder = publish_placeholder(&store, &emitter);
        let agg = aggregate(placeholder, fragments(&[]), &store, &CancellationToken::new()).await;
        assert_eq!(agg.buffer, "");
        assert_eq!(agg.fragment_count, 0);
        assert!(agg.ttft_ms.is_none());
    }

    #[tokio::test]
    async fn pre_cancelled_token_applies_nothing() {
        let (emitter, store) = setup();
        let placeholder = publish_placeholder(&store, &emitter);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let agg = aggregate(placeholder, fragments(&["never"]), &store, &cancel).await;
        assert!(agg.cancelled);
        assert_eq!(agg.buffer, "");

        let settled = settle(agg, &store, &emitter, Instant::now());
        assert_eq!(settled.first_text(), GENERATION_STOPPED_SUFFIX);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_between_fragments_stops_applying() {
        let (emitter, store) = setup();
        let placeholder = publish_placeholder(&store, &emitter);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let stream: FragmentStream = Box::pin(async_stream::stream! {
            yield "first".to_string();
            trigger.cancel();
            tokio::time::sleep(Duration::from_millis(10)).await;
            yield "second".to_string();
        });

        let agg = aggregate(placeholder, stream, &store, &cancel).await;
        assert!(agg.cancelled);
        assert_eq!(agg.buffer, "first");
    }

    #[tokio::test]
    async fn deleted_message_is_not_resurrected() {
        let (emitter, store) = setup();
        let placeholder = publish_placeholder(&store, &emitter);
        let _ = store.lock().remove(&placeholder.id);

        let agg = aggregate(
            placeholder.clone(),
            fragments(&["late"]),
            &store,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(agg.buffer, "late");
        assert!(store.lock().is_empty());

        let mut rx = emitter.subscribe();
        let settled = settle(agg, &store, &emitter, Instant::now());
        assert_eq!(settled.first_text(), "late");
        assert!(store.lock().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_attaches_citations_and_time() {
        let (emitter, store) = setup();
        let started = Instant::now();
        let placeholder = publish_placeholder(&store, &emitter);
        let agg = aggregate(
            placeholder.clone(),
            fragments(&["Answer---CITATIONS---", r#"[{"fileName":"a.pdf","quote":"x"}]"#]),
            &store,
            &CancellationToken::new(),
        )
        .await;

        tokio::time::advance(Duration::from_millis(250)).await;
        let mut rx = emitter.subscribe();
        let settled = settle(agg, &store, &emitter, started);

        assert_eq!(settled.parts, [Part::text("Answer")]);
        assert_eq!(
            settled.citations,
            Some(vec![Citation {
                file_name: "a.pdf".into(),
                quote: "x".into()
            }])
        );
        assert_eq!(settled.generation_time_ms, Some(250));
        assert_eq!(store.lock().get(&placeholder.id), Some(&settled));

        assert_eq!(rx.try_recv().unwrap().event_type(), "message_updated");
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::GenerationSettled {
                message_id: placeholder.id,
                cancelled: false,
                generation_time_ms: 250,
            }
        );
    }
}

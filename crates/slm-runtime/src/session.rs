//! Session, the single entry point for one conversation.
//!
//! A [`Session`] owns the message store, document set, rule set, event
//! emitter, generation controller, and both sources. Nothing lives in
//! ambient global state; persistence happens only at the edges through
//! [`Session::snapshot`] and [`Session::restore`].
//!
//! Sends and distillations are serialized by the controller: starting one
//! while another is in flight fails with [`RuntimeError::SessionBusy`].

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use slm_core::documents::{Document, DocumentSet};
use slm_core::events::SessionEvent;
use slm_core::ids::MessageId;
use slm_core::messages::{Message, Part};
use slm_core::rules::{self, LogicFile, RuleSet};
use slm_llm::context_composition::build_generation_request;
use slm_llm::{DistillationSource, GenerationSource};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::cancellation::{GenerationController, Operation, StopHandle};
use crate::distillation::distill_rule;
use crate::errors::RuntimeError;
use crate::event_emitter::EventEmitter;
use crate::message_store::MessageStore;
use crate::stream_aggregator::{aggregate, publish_placeholder, settle};

// ─────────────────────────────────────────────────────────────────────────────
// Phase & snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of the model message of the current (or last) send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePhase {
    /// No send has started.
    Idle,
    /// Placeholder published, fragments being applied.
    Streaming,
    /// Decoder running.
    Finalizing,
    /// Citations and timing attached; no further mutation.
    Settled,
}

/// Persisted session shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Grounding documents.
    #[serde(default)]
    pub documents: Vec<Document>,
    /// Conversation messages in order.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Rule set, absent until one has been established.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<LogicFile>,
}

impl SessionSnapshot {
    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String, RuntimeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot written by [`SessionSnapshot::to_json`].
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        Ok(serde_json::from_str(json)?)
    }
}

struct PhaseState {
    phase: MessagePhase,
    message_id: Option<MessageId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// One conversation with its grounding and sources.
pub struct Session {
    store: Mutex<MessageStore>,
    documents: Mutex<DocumentSet>,
    logic: Mutex<Option<RuleSet>>,
    phase: Mutex<PhaseState>,
    emitter: Arc<EventEmitter>,
    controller: GenerationController,
    generation: Arc<dyn GenerationSource>,
    distillation: Arc<dyn DistillationSource>,
}

/// Releases the in-flight slot even if the owning future is dropped.
struct InFlightGuard<'a> {
    controller: &'a GenerationController,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.controller.finish();
    }
}

impl Session {
    /// Empty session.
    pub fn new(
        generation: Arc<dyn GenerationSource>,
        distillation: Arc<dyn DistillationSource>,
    ) -> Self {
        Self::restore(SessionSnapshot::default(), generation, distillation)
    }

    /// Session rebuilt from a snapshot. Emits nothing.
    pub fn restore(
        snapshot: SessionSnapshot,
        generation: Arc<dyn GenerationSource>,
        distillation: Arc<dyn DistillationSource>,
    ) -> Self {
        let emitter = Arc::new(EventEmitter::new());
        let mut documents = DocumentSet::new();
        let _ = documents.add(snapshot.documents);
        Self {
            store: Mutex::new(MessageStore::with_messages(
                Arc::clone(&emitter),
                snapshot.messages,
            )),
            documents: Mutex::new(documents),
            logic: Mutex::new(snapshot.logic.map(RuleSet::from)),
            phase: Mutex::new(PhaseState {
                phase: MessagePhase::Idle,
                message_id: None,
            }),
            emitter,
            controller: GenerationController::new(),
            generation,
            distillation,
        }
    }

    /// Current persisted shape.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            documents: self.documents.lock().as_slice().to_vec(),
            messages: self.store.lock().messages().to_vec(),
            logic: self.logic.lock().as_ref().map(RuleSet::to_logic_file),
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.emitter.subscribe()
    }

    // ── Sending ──────────────────────────────────────────────────────────

    /// Append a user message, stream the model answer, and return the
    /// settled model message.
    ///
    /// Source failures never surface here; they settle as the fallback text.
    #[instrument(skip_all, fields(source = self.generation.name(), parts = parts.len()))]
    pub async fn send_message(&self, parts: Vec<Part>) -> Result<Message, RuntimeError> {
        if parts.is_empty() {
            return Err(RuntimeError::EmptyMessage);
        }
        let token = self.begin_send()?;
        let _guard = InFlightGuard {
            controller: &self.controller,
        };
        let started = Instant::now();

        self.store.lock().append(Message::user(parts));
        let request = {
            let store = self.store.lock();
            let documents = self.documents.lock();
            let logic = self.logic.lock();
            build_generation_request(
                store.messages(),
                documents.as_slice(),
                logic.as_ref().map(RuleSet::rules).unwrap_or_default(),
            )
        };
        debug!(turns = request.turn_count(), "generation request composed");

        let placeholder = publish_placeholder(&self.store, &self.emitter);
        self.set_phase(MessagePhase::Streaming, Some(placeholder.id.clone()));

        let stream = self.generation.stream(&request, token.clone()).await;
        let aggregation = aggregate(placeholder, stream, &self.store, &token).await;

        self.set_phase(MessagePhase::Finalizing, None);
        let settled = settle(aggregation, &self.store, &self.emitter, started);
        self.set_phase(MessagePhase::Settled, None);

        info!(
            message_id = %settled.id,
            generation_time_ms = settled.generation_time_ms.unwrap_or_default(),
            "send settled"
        );
        Ok(settled)
    }

    /// Claim the in-flight slot for a send and forget the previous send's
    /// message, so a stop before the placeholder exists names nothing.
    fn begin_send(&self) -> Result<CancellationToken, RuntimeError> {
        let token = self.controller.begin(Operation::Send)?;
        self.phase.lock().message_id = None;
        Ok(token)
    }

    /// Stop the in-flight send. Idempotent; returns whether this call
    /// stopped something.
    pub fn stop_generation(&self) -> bool {
        if !self.controller.stop() {
            return false;
        }
        if let Some(message_id) = self.phase.lock().message_id.clone() {
            let _ = self.emitter.emit(SessionEvent::GenerationStopped { message_id });
        }
        true
    }

    /// Stop-only handle usable from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.controller.stop_handle()
    }

    /// Whether a UI should show a pending indicator.
    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    /// Phase of the current or last model message.
    pub fn message_phase(&self) -> MessagePhase {
        self.phase.lock().phase
    }

    fn set_phase(&self, phase: MessagePhase, message_id: Option<MessageId>) {
        let mut state = self.phase.lock();
        state.phase = phase;
        if message_id.is_some() {
            state.message_id = message_id;
        }
    }

    /// Whether `id` is the model message of a send still being assembled.
    fn is_in_flight_message(&self, id: &MessageId) -> bool {
        let state = self.phase.lock();
        matches!(state.phase, MessagePhase::Streaming | MessagePhase::Finalizing)
            && state.message_id.as_ref() == Some(id)
    }

    // ── Messages ─────────────────────────────────────────────────────────

    /// Messages in conversation order.
    pub fn messages(&self) -> Vec<Message> {
        self.store.lock().messages().to_vec()
    }

    /// Delete a message. Deleting the in-flight model message also cancels
    /// its stream.
    pub fn delete_message(&self, id: &MessageId) -> Result<Message, RuntimeError> {
        if self.is_in_flight_message(id) {
            let _ = self.stop_generation();
        }
        self.store
            .lock()
            .remove(id)
            .ok_or_else(|| RuntimeError::MessageNotFound(id.to_string()))
    }

    /// Remove every message, cancelling any in-flight send.
    pub fn clear_chat(&self) {
        let _ = self.stop_generation();
        self.store.lock().clear();
    }

    // ── Documents ────────────────────────────────────────────────────────

    /// Add documents, skipping file names already present. Returns how many
    /// were added.
    pub fn add_documents(&self, docs: impl IntoIterator<Item = Document>) -> usize {
        let (added, count) = {
            let mut documents = self.documents.lock();
            (documents.add(docs), documents.len())
        };
        if added > 0 {
            let _ = self.emitter.emit(SessionEvent::DocumentsChanged { count });
        }
        added
    }

    /// Remove a document by file name.
    pub fn remove_document(&self, file_name: &str) -> bool {
        let (removed, count) = {
            let mut documents = self.documents.lock();
            (documents.remove(file_name), documents.len())
        };
        if removed {
            let _ = self.emitter.emit(SessionEvent::DocumentsChanged { count });
        }
        removed
    }

    /// Documents in insertion order.
    pub fn documents(&self) -> Vec<Document> {
        self.documents.lock().as_slice().to_vec()
    }

    // ── Rules ────────────────────────────────────────────────────────────

    /// Distill one rule from the conversation and append it.
    pub async fn save_logic(&self) -> Result<String, RuntimeError> {
        let _token = self.controller.begin(Operation::Distill)?;
        let _guard = InFlightGuard {
            controller: &self.controller,
        };
        let (messages, documents) = (self.messages(), self.documents());
        let rule = distill_rule(self.distillation.as_ref(), &messages, &documents).await?;
        self.edit_rules(|set| {
            set.push(rule.clone());
            Ok(())
        })?;
        Ok(rule)
    }

    /// Append a rule typed by the user.
    pub fn add_rule(&self, text: &str) -> Result<(), RuntimeError> {
        let rule = normalize_rule(text)?;
        self.edit_rules(|set| {
            set.push(rule);
            Ok(())
        })
    }

    /// Insert a rule at `index` (`index == len` appends).
    pub fn insert_rule(&self, index: usize, text: &str) -> Result<(), RuntimeError> {
        let rule = normalize_rule(text)?;
        self.edit_rules(|set| {
            if set.insert(index, rule) {
                Ok(())
            } else {
                Err(RuntimeError::RuleNotFound(index))
            }
        })
    }

    /// Replace the rule at `index`, returning the old text.
    pub fn replace_rule(&self, index: usize, text: &str) -> Result<String, RuntimeError> {
        let rule = normalize_rule(text)?;
        self.edit_rules(|set| set.replace(index, rule).ok_or(RuntimeError::RuleNotFound(index)))
    }

    /// Remove the rule at `index`, returning it.
    pub fn remove_rule(&self, index: usize) -> Result<String, RuntimeError> {
        self.edit_rules(|set| set.remove(index).ok_or(RuntimeError::RuleNotFound(index)))
    }

    /// Drop the rule set entirely.
    pub fn clear_rules(&self) {
        *self.logic.lock() = None;
        let _ = self.emitter.emit(SessionEvent::RulesChanged { count: 0 });
    }

    /// Rules in order.
    pub fn rules(&self) -> Vec<String> {
        self.logic
            .lock()
            .as_ref()
            .map(|set| set.rules().to_vec())
            .unwrap_or_default()
    }

    /// Current rule set, if one has been established.
    pub fn rule_set(&self) -> Option<RuleSet> {
        self.logic.lock().clone()
    }

    /// Replace the rule set with an uploaded logic file. Rejected content
    /// leaves the current rules untouched. Returns the new rule count.
    pub fn upload_logic(&self, json: &str) -> Result<usize, RuntimeError> {
        let set = RuleSet::parse(json)?;
        let count = set.len();
        *self.logic.lock() = Some(set);
        let _ = self.emitter.emit(SessionEvent::RulesChanged { count });
        info!(count, "logic uploaded");
        Ok(count)
    }

    /// Current rules as a pretty logic file. With no rule set this is an
    /// empty file at the current format version.
    pub fn download_logic(&self) -> Result<String, RuntimeError> {
        let set = self.logic.lock().clone().unwrap_or_default();
        Ok(set.to_pretty_json()?)
    }

    /// Download file name for a logic file exported on `date`.
    pub fn logic_file_name(date: NaiveDate) -> String {
        rules::logic_file_name(date)
    }

    fn edit_rules<T>(
        &self,
        edit: impl FnOnce(&mut RuleSet) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let (out, count) = {
            let mut logic = self.logic.lock();
            let mut set = logic.clone().unwrap_or_default();
            let out = edit(&mut set)?;
            let count = set.len();
            *logic = Some(set);
            (out, count)
        };
        let _ = self.emitter.emit(SessionEvent::RulesChanged { count });
        Ok(out)
    }
}

fn normalize_rule(text: &str) -> Result<String, RuntimeError> {
    let rule = text.trim();
    if rule.is_empty() {
        return Err(RuntimeError::InvalidRule("rule text is empty".into()));
    }
    Ok(rule.to_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use slm_core::constants::APP_VERSION;
    use slm_llm::{FragmentStream, GenerationRequest, ProviderResult};

    use super::*;

    struct Echo;

    #[async_trait]
    impl GenerationSource for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn stream(&self, request: &GenerationRequest, _: CancellationToken) -> FragmentStream {
            let turns = request.turn_count().to_string();
            Box::pin(futures::stream::iter(vec![turns]))
        }
    }

    #[async_trait]
    impl DistillationSource for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn distill(&self, _: &str) -> ProviderResult<String> {
            Ok("'Be brief.'".into())
        }
    }

    fn session() -> Session {
        Session::new(Arc::new(Echo), Arc::new(Echo))
    }

    #[tokio::test]
    async fn send_excludes_placeholder_from_request() {
        let s = session();
        let settled = s.send_message(vec![Part::text("hi")]).await.unwrap();
        assert_eq!(settled.first_text(), "1");
        assert_eq!(s.messages().len(), 2);
        assert_eq!(s.message_phase(), MessagePhase::Settled);
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn stop_before_placeholder_names_no_message() {
        let s = session();
        let _ = s.send_message(vec![Part::text("hi")]).await.unwrap();
        let mut rx = s.subscribe();

        let token = s.begin_send().unwrap();
        assert!(s.stop_generation());
        assert!(token.is_cancelled());
        assert!(rx.try_recv().is_err());
        s.controller.finish();

        let _ = s.send_message(vec![Part::text("again")]).await.unwrap();
    }

    #[tokio::test]
    async fn empty_parts_rejected() {
        let s = session();
        assert_matches!(s.send_message(vec![]).await, Err(RuntimeError::EmptyMessage));
        assert!(s.messages().is_empty());
    }

    #[tokio::test]
    async fn save_logic_appends_unquoted_rule() {
        let s = session();
        s.add_rule("first").unwrap();
        let _ = s.send_message(vec![Part::text("hi")]).await.unwrap();
        assert_eq!(s.save_logic().await.unwrap(), "Be brief.");
        assert_eq!(s.rules(), ["first", "Be brief."]);
    }

    #[test]
    fn rule_editing() {
        let s = session();
        assert_matches!(s.add_rule("   "), Err(RuntimeError::InvalidRule(_)));
        s.add_rule("  a ").unwrap();
        s.add_rule("c").unwrap();
        s.insert_rule(1, "b").unwrap();
        assert_eq!(s.rules(), ["a", "b", "c"]);

        assert_eq!(s.replace_rule(2, "C").unwrap(), "c");
        assert_eq!(s.remove_rule(0).unwrap(), "a");
        assert_matches!(s.remove_rule(9), Err(RuntimeError::RuleNotFound(9)));
        assert_matches!(s.insert_rule(5, "x"), Err(RuntimeError::RuleNotFound(5)));
        assert_eq!(s.rules(), ["b", "C"]);

        s.clear_rules();
        assert!(s.rule_set().is_none());
        assert_matches!(s.remove_rule(0), Err(RuntimeError::RuleNotFound(0)));
        assert!(s.rule_set().is_none());
        assert!(s.snapshot().logic.is_none());
    }

    #[test]
    fn rejected_upload_keeps_rules() {
        let s = session();
        s.add_rule("keep me").unwrap();
        assert_matches!(
            s.upload_logic(r#"{"version":"2.0.0","logic":"not an array"}"#),
            Err(RuntimeError::LogicFile(_))
        );
        assert_matches!(s.upload_logic("not json"), Err(RuntimeError::LogicFile(_)));
        assert_eq!(s.rules(), ["keep me"]);
    }

    #[test]
    fn download_without_rules_is_empty_file() {
        let s = session();
        let json = s.download_logic().unwrap();
        let file: LogicFile = serde_json::from_str(&json).unwrap();
        assert_eq!(file.version, APP_VERSION);
        assert!(file.logic.is_empty());
    }

    #[test]
    fn documents_dedupe_and_emit() {
        let s = session();
        let mut rx = s.subscribe();
        assert_eq!(s.add_documents([Document::new("a.txt", "1")]), 1);
        assert_eq!(s.add_documents([Document::new("a.txt", "2")]), 0);
        assert_eq!(s.documents().len(), 1);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::DocumentsChanged { count: 1 });
        assert!(rx.try_recv().is_err());

        assert!(s.remove_document("a.txt"));
        assert!(!s.remove_document("a.txt"));
    }

    #[test]
    fn delete_unknown_message_fails() {
        let s = session();
        assert_matches!(
            s.delete_message(&MessageId::from("nope")),
            Err(RuntimeError::MessageNotFound(_))
        );
    }

    #[test]
    fn logic_file_name_format() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            Session::logic_file_name(date),
            "social-listening-logic-2025-03-07.json"
        );
    }
}

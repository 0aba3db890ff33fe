//! Ordered message store.
//!
//! Messages are kept in conversation order and addressed by id. Updates are
//! update-only: replacing a message whose id is gone is a no-op, so a
//! deleted message can never be resurrected by a late fragment.

use std::sync::Arc;

use slm_core::events::SessionEvent;
use slm_core::ids::MessageId;
use slm_core::messages::Message;

use crate::event_emitter::EventEmitter;

/// Conversation messages keyed by id.
pub struct MessageStore {
    messages: Vec<Message>,
    emitter: Arc<EventEmitter>,
}

impl MessageStore {
    /// Empty store publishing to `emitter`.
    pub fn new(emitter: Arc<EventEmitter>) -> Self {
        Self {
            messages: Vec::new(),
            emitter,
        }
    }

    /// Store pre-populated from a snapshot. Emits nothing.
    pub fn with_messages(emitter: Arc<EventEmitter>, messages: Vec<Message>) -> Self {
        Self { messages, emitter }
    }

    /// Append a message to the end of the conversation.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message.clone());
        let _ = self.emitter.emit(SessionEvent::MessageAppended { message });
    }

    /// Replace the message with the same id. Returns `false` (and emits
    /// nothing) if no such message exists.
    pub fn update(&mut self, message: Message) -> bool {
        let Some(slot) = self.messages.iter_mut().find(|m| m.id == message.id) else {
            return false;
        };
        *slot = message.clone();
        let _ = self.emitter.emit(SessionEvent::MessageUpdated { message });
        true
    }

    /// Remove a message by id, returning it.
    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|m| &m.id == id)?;
        let removed = self.messages.remove(index);
        let _ = self.emitter.emit(SessionEvent::MessageRemoved {
            message_id: id.clone(),
        });
        Some(removed)
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
        let _ = self.emitter.emit(SessionEvent::ChatCleared);
    }

    /// Look up a message by id.
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Whether a message with `id` exists.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    /// All messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use slm_core::messages::{Part, Role};

    use super::*;

    fn store() -> (MessageStore, tokio::sync::broadcast::Receiver<SessionEvent>) {
        let emitter = Arc::new(EventEmitter::new());
        let rx = emitter.subscribe();
        (MessageStore::new(emitter), rx)
    }

    #[test]
    fn append_keeps_order_and_emits() {
        let (mut store, mut rx) = store();
        let a = Message::user(vec![Part::text("a")]);
        let b = Message::model_placeholder();
        store.append(a.clone());
        store.append(b.clone());

        assert_eq!(store.len(), 2);
        assert_eq!(store.messages()[0].id, a.id);
        assert_eq!(store.messages()[1].role, Role::Model);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::MessageAppended { message: a }
        );
    }

    #[test]
    fn update_replaces_whole_message() {
        let (mut store, mut rx) = store();
        let mut msg = Message::model_placeholder();
        store.append(msg.clone());
        let _ = rx.try_recv();

        msg.append_text("hello");
        assert!(store.update(msg.clone()));
        assert_eq!(store.get(&msg.id).unwrap().first_text(), "hello");
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::MessageUpdated { message: msg }
        );
    }

    #[test]
    fn update_of_missing_id_is_noop() {
        let (mut store, mut rx) = store();
        let mut msg = Message::model_placeholder();
        msg.append_text("ghost");

        assert!(!store.update(msg.clone()));
        assert!(store.is_empty());
        assert!(!store.contains(&msg.id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn remove_then_update_does_not_resurrect() {
        let (mut store, _rx) = store();
        let mut msg = Message::model_placeholder();
        store.append(msg.clone());

        let removed = store.remove(&msg.id).unwrap();
        assert_eq!(removed.id, msg.id);

        msg.append_text("late fragment");
        assert!(!store.update(msg));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_unknown_returns_none() {
        let (mut store, mut rx) = store();
        assert!(store.remove(&MessageId::from("nope")).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clear_empties_and_emits() {
        let (mut store, mut rx) = store();
        store.append(Message::user(vec![Part::text("x")]));
        let _ = rx.try_recv();

        store.clear();
        assert!(store.is_empty());
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::ChatCleared);
    }

    #[test]
    fn with_messages_emits_nothing() {
        let emitter = Arc::new(EventEmitter::new());
        let store = MessageStore::with_messages(
            Arc::clone(&emitter),
            vec![Message::user(vec![Part::text("restored")])],
        );
        assert_eq!(store.len(), 1);
        assert_eq!(emitter.emit_count(), 0);
    }
}

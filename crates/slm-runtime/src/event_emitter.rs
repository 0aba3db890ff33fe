//! Broadcast-based emitter for [`SessionEvent`] dispatch.

use std::sync::atomic::{AtomicU64, Ordering};

use slm_core::events::SessionEvent;
use tokio::sync::broadcast;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast-based event emitter.
///
/// Non-blocking: `emit` never awaits. Slow receivers lag rather than
/// blocking the session.
pub struct EventEmitter {
    tx: broadcast::Sender<SessionEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create a new emitter with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Returns how many received it.
    pub fn emit(&self, event: SessionEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of events emitted.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_with_no_subscribers() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.emit(SessionEvent::ChatCleared), 0);
        assert_eq!(emitter.emit_count(), 1);
    }

    #[tokio::test]
    async fn emit_and_receive() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        assert_eq!(emitter.emit(SessionEvent::RulesChanged { count: 2 }), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, SessionEvent::RulesChanged { count: 2 });
        assert_eq!(received.event_type(), "rules_changed");
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let emitter = EventEmitter::with_capacity(2);
        let mut rx = emitter.subscribe();

        for count in 0..3 {
            let _ = emitter.emit(SessionEvent::DocumentsChanged { count });
        }

        assert!(rx.recv().await.is_err());
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let emitter = EventEmitter::default();
        let rx1 = emitter.subscribe();
        let rx2 = emitter.subscribe();
        assert_eq!(emitter.subscriber_count(), 2);
        drop(rx1);
        assert_eq!(emitter.subscriber_count(), 1);
        drop(rx2);
        assert_eq!(emitter.subscriber_count(), 0);
    }
}

//! Generation controller.
//!
//! Serializes outstanding operations on a session and owns the cancellation
//! token of the current send. Two flags are tracked separately:
//!
//! - **in flight**: an operation holds the slot; released by [`GenerationController::finish`]
//!   only after the decoder has run
//! - **busy**: what a UI shows; cleared by [`GenerationController::stop`]
//!   immediately, while the aggregator may still be draining

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::RuntimeError;

/// Kind of operation occupying the in-flight slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Streaming a model answer.
    Send,
    /// One-shot rule distillation.
    Distill,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Distill => "distill",
        }
    }
}

#[derive(Default)]
struct ControllerState {
    in_flight: Option<(Operation, CancellationToken)>,
    busy: bool,
}

/// Per-session controller. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct GenerationController {
    state: Arc<Mutex<ControllerState>>,
}

impl GenerationController {
    /// Idle controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the in-flight slot and return a fresh token scoped to `op`.
    ///
    /// Fails with [`RuntimeError::SessionBusy`] while any operation is still
    /// in flight, including a stopped send that has not finalized yet.
    pub fn begin(&self, op: Operation) -> Result<CancellationToken, RuntimeError> {
        let mut state = self.state.lock();
        if let Some((current, _)) = &state.in_flight {
            return Err(RuntimeError::SessionBusy(format!(
                "a {} is still in progress",
                current.as_str()
            )));
        }
        let token = CancellationToken::new();
        state.in_flight = Some((op, token.clone()));
        state.busy = true;
        debug!(operation = op.as_str(), "operation started");
        Ok(token)
    }

    /// Cancel the in-flight send and clear the busy indicator.
    ///
    /// Idempotent. Returns `true` only for the call that actually cancelled
    /// a running send; distillation is not stoppable.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let Some((Operation::Send, token)) = &state.in_flight else {
            return false;
        };
        if token.is_cancelled() {
            return false;
        }
        token.cancel();
        state.busy = false;
        debug!("send cancelled");
        true
    }

    /// Release the in-flight slot after finalization.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight = None;
        state.busy = false;
    }

    /// Whether a UI should show a pending indicator.
    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Whether an operation still holds the slot.
    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    /// A handle that can only stop, for use from signal handlers.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            controller: self.clone(),
        }
    }
}

/// Stop-only view of a [`GenerationController`].
#[derive(Clone)]
pub struct StopHandle {
    controller: GenerationController,
}

impl StopHandle {
    /// See [`GenerationController::stop`].
    pub fn stop(&self) -> bool {
        self.controller.stop()
    }

    /// See [`GenerationController::is_busy`].
    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

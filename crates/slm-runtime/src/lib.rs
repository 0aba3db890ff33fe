//! # slm-runtime
//!
//! Conversation runtime for Social Listening LM.
//!
//! - **Session**: the single entry point owning messages, documents, rules,
//!   and the two sources. Persisted only through [`session::SessionSnapshot`].
//! - **Message store**: ordered messages keyed by id; every mutation is
//!   broadcast as a full-message [`slm_core::events::SessionEvent`]
//! - **Stream aggregator**: drives a generation source into a placeholder
//!   model message, checking the cancellation token before every fragment
//! - **Citation decoder**: pure post-processing of the final buffer into
//!   answer, citations, and diagnostic suffixes
//! - **Generation controller**: one cancellation token per send, with a busy
//!   indicator that stop clears synchronously
//! - **Distillation**: one-shot rule extraction with rate-limit vs generic
//!   failure classification
//! - **Ingest**: plain-text document loading with per-file failure isolation
//!
//! ## Crate Position
//!
//! Depends on `slm-core` and `slm-llm`. Depended on by `slm-cli`.

#![deny(unsafe_code)]

pub mod cancellation;
pub mod citations;
pub mod distillation;
pub mod errors;
pub mod event_emitter;
pub mod ingest;
pub mod message_store;
pub mod session;
pub mod stream_aggregator;

pub use cancellation::{GenerationController, Operation, StopHandle};
pub use errors::RuntimeError;
pub use session::{MessagePhase, Session, SessionSnapshot};

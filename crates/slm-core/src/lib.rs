//! # slm-core
//!
//! Foundation types for Social Listening LM, a grounded chat assistant that
//! cites source documents and distills reusable rules from conversations.
//!
//! This crate provides the shared vocabulary that all other crates depend on:
//!
//! - **Branded IDs**: [`ids::MessageId`] as a newtype over a UUID v7 string
//! - **Messages**: [`messages::Message`] with [`messages::Part`] (text or inline binary)
//!   and optional [`messages::Citation`]s
//! - **Documents**: [`documents::Document`] and the filename-unique [`documents::DocumentSet`]
//! - **Rules**: [`rules::RuleSet`] plus the persisted [`rules::LogicFile`] format
//! - **Events**: [`events::SessionEvent`] broadcast on every store or session mutation
//! - **Constants**: fixed user-visible strings and the citation separator
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other slm crates.

#![deny(unsafe_code)]

pub mod constants;
pub mod documents;
pub mod events;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod rules;
pub mod text;

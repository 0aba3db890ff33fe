//! # slm-llm
//!
//! Generation and distillation sources for Social Listening LM.
//!
//! - [`provider::GenerationSource`] / [`provider::DistillationSource`]: the two
//!   collaborator traits the runtime drives
//! - [`provider::ProviderError`]: failure taxonomy with rate-limit classification
//! - [`context_composition`]: grounding blocks, system instruction, request
//!   mapping, and the distillation prompt
//! - [`fallback`]: turns a failing fragment stream into a single fallback fragment
//! - [`sse`] / [`error_parsing`]: shared HTTP streaming plumbing
//! - [`google`]: the Gemini implementation of both traits
//!
//! ## Crate Position
//!
//! Depends on `slm-core`. Depended on by `slm-runtime` and `slm-cli`.

#![deny(unsafe_code)]

pub mod context_composition;
pub mod error_parsing;
pub mod fallback;
pub mod google;
pub mod provider;
pub mod request;
pub mod sse;

pub use provider::{
    DistillationSource, FragmentStream, GenerationSource, ProviderError, ProviderResult,
};
pub use request::{GenerationRequest, RequestContent};

//! Transient request payload handed to a [`GenerationSource`](crate::GenerationSource).

use serde::Serialize;
use slm_core::messages::{Part, Role};

/// One conversation turn in request form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestContent {
    /// Author of the turn.
    pub role: Role,
    /// Parts in their stored order.
    pub parts: Vec<Part>,
}

/// Everything a generation source needs for one send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Preamble plus grounding blocks.
    pub system_instruction: String,
    /// Conversation history, one entry per message.
    pub contents: Vec<RequestContent>,
}

impl GenerationRequest {
    /// Number of history entries.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.contents.len()
    }
}

//! Session events.
//!
//! Every mutation of a session (message store, documents, rules, generation
//! lifecycle) is announced as a [`SessionEvent`]. Message events carry the
//! whole message object, never a partial delta, so a subscriber can render
//! from any single event without replaying history.

use serde::{Deserialize, Serialize};

use crate::ids::MessageId;
use crate::messages::Message;

/// Broadcast on every session mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    // -- Message store --
    /// A message was appended to the end of the conversation.
    MessageAppended {
        /// Full message snapshot.
        message: Message,
    },

    /// A message was replaced in place.
    MessageUpdated {
        /// Full message snapshot after the update.
        message: Message,
    },

    /// A message was deleted.
    MessageRemoved {
        /// Id of the deleted message.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },

    /// Every message was removed.
    ChatCleared,

    // -- Generation lifecycle --
    /// A send began; the placeholder model message exists.
    GenerationStarted {
        /// Placeholder message id.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },

    /// The decoder ran and the model message is final.
    GenerationSettled {
        /// Settled message id.
        #[serde(rename = "messageId")]
        message_id: MessageId,
        /// Whether the user stopped the generation.
        cancelled: bool,
        /// Wall-clock generation time.
        #[serde(rename = "generationTimeMs")]
        generation_time_ms: u64,
    },

    /// The user asked to stop the in-flight generation.
    GenerationStopped {
        /// Id of the message being generated.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },

    // -- Grounding --
    /// The rule set changed (append, edit, upload, or clear).
    RulesChanged {
        /// Rule count after the change.
        count: usize,
    },

    /// The document set changed.
    DocumentsChanged {
        /// Document count after the change.
        count: usize,
    },
}

impl SessionEvent {
    /// Event type string (matches the serialized `type` tag).
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageAppended { .. } => "message_appended",
            Self::MessageUpdated { .. } => "message_updated",
            Self::MessageRemoved { .. } => "message_removed",
            Self::ChatCleared => "chat_cleared",
            Self::GenerationStarted { .. } => "generation_started",
            Self::GenerationSettled { .. } => "generation_settled",
            Self::GenerationStopped { .. } => "generation_stopped",
            Self::RulesChanged { .. } => "rules_changed",
            Self::DocumentsChanged { .. } => "documents_changed",
        }
    }

    /// Id of the message this event concerns, if any.
    #[must_use]
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::MessageAppended { message } | Self::MessageUpdated { message } => {
                Some(&message.id)
            }
            Self::MessageRemoved { message_id }
            | Self::GenerationStarted { message_id }
            | Self::GenerationSettled { message_id, .. }
            | Self::GenerationStopped { message_id } => Some(message_id),
            Self::ChatCleared | Self::RulesChanged { .. } | Self::DocumentsChanged { .. } => None,
        }
    }
}

//! Conversation message types.
//!
//! - [`Message`]: one conversation turn, addressed by a stable [`MessageId`]
//! - [`Part`]: exactly one of text or inline binary data
//! - [`Citation`]: a quote attributed to a source document
//!
//! All types serialize with camelCase field names so a persisted session
//! snapshot stays readable by older clients.

use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::MessageId;

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The generation source.
    Model,
}

impl Role {
    /// Wire name of the role (`"user"` / `"model"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parts
// ─────────────────────────────────────────────────────────────────────────────

/// Inline binary payload (images pasted into the chat).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// One ordered piece of a message.
///
/// Serializes as `{"text": ..}` or `{"inlineData": {..}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Inline binary data.
    InlineData {
        /// The binary payload.
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    /// Build a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Build an inline binary part.
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    /// Text content, if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::InlineData { .. } => None,
        }
    }
}

/// Loose on-disk shape: both fields optional.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

impl From<RawPart> for Part {
    fn from(raw: RawPart) -> Self {
        match (raw.inline_data, raw.text) {
            (Some(inline_data), _) => Self::InlineData { inline_data },
            (None, Some(text)) => Self::Text { text },
            // Neither populated: keep the slot as empty text so part
            // positions stay aligned.
            (None, None) => Self::Text {
                text: String::new(),
            },
        }
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawPart::deserialize(deserializer).map(Self::from)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Citation
// ─────────────────────────────────────────────────────────────────────────────

/// A quote attributed to a grounding document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Source document file name.
    pub file_name: String,
    /// Verbatim quote from the document.
    pub quote: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// One conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable, never-reused id.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Ordered content parts.
    pub parts: Vec<Part>,
    /// Citations, present only on settled model messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    /// Wall-clock generation time of a settled model message.
    #[serde(
        default,
        alias = "generationTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub generation_time_ms: Option<u64>,
}

impl Message {
    /// A new user message with a fresh id.
    #[must_use]
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            parts,
            citations: None,
            generation_time_ms: None,
        }
    }

    /// A pending model message with no parts yet.
    #[must_use]
    pub fn model_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Model,
            parts: Vec::new(),
            citations: None,
            generation_time_ms: None,
        }
    }

    /// Append a streamed fragment to the first text part, creating one if
    /// the message has none yet.
    pub fn append_text(&mut self, fragment: &str) {
        let existing = self.parts.iter_mut().find_map(|p| match p {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        });
        match existing {
            Some(text) => text.push_str(fragment),
            None => self.parts.push(Part::text(fragment)),
        }
    }

    /// Content of the first text part, or `""`.
    #[must_use]
    pub fn first_text(&self) -> &str {
        self.parts.iter().find_map(Part::as_text).unwrap_or("")
    }

    /// All text parts joined by a single space and trimmed. Binary parts
    /// are left out.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_owned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Part wire shape ─────────────────────────────────────────────────

    #[test]
    fn text_part_serializes_flat() {
        let v = serde_json::to_value(Part::text("hi")).unwrap();
        assert_eq!(v, json!({"text": "hi"}));
    }

    #[test]
    fn inline_part_serializes_camel_case() {
        let v = serde_json::to_value(Part::inline("image/png", "AAAA")).unwrap();
        assert_eq!(
            v,
            json!({"inlineData": {"mimeType": "image/png", "data": "AAAA"}})
        );
    }

    #[test]
    fn empty_legacy_part_becomes_empty_text() {
        let part: Part = serde_json::from_value(json!({})).unwrap();
        assert_eq!(part, Part::text(""));
    }

    #[test]
    fn inline_data_wins_over_text() {
        let part: Part = serde_json::from_value(json!({
            "text": "ignored",
            "inlineData": {"mimeType": "image/jpeg", "data": "Zm9v"}
        }))
        .unwrap();
        assert_eq!(part, Part::inline("image/jpeg", "Zm9v"));
    }

    // ── Message ─────────────────────────────────────────────────────────

    #[test]
    fn append_creates_first_text_part() {
        let mut msg = Message::model_placeholder();
        assert!(msg.parts.is_empty());
        msg.append_text("Hel");
        msg.append_text("lo");
        assert_eq!(msg.parts, vec![Part::text("Hello")]);
    }

    #[test]
    fn append_targets_first_text_part_after_binary() {
        let mut msg = Message::user(vec![Part::inline("image/png", "AA"), Part::text("a")]);
        msg.append_text("b");
        assert_eq!(msg.parts[1], Part::text("ab"));
        assert_eq!(msg.parts.len(), 2);
    }

    #[test]
    fn text_content_skips_binary_parts() {
        let msg = Message::user(vec![
            Part::text(" look at "),
            Part::inline("image/png", "AA"),
            Part::text("this "),
        ]);
        assert_eq!(msg.text_content(), "look at  this");
    }

    #[test]
    fn message_accepts_legacy_generation_time() {
        let msg: Message = serde_json::from_value(json!({
            "id": "model-1",
            "role": "model",
            "parts": [{"text": "ok"}],
            "citations": [],
            "generationTime": 1250
        }))
        .unwrap();
        assert_eq!(msg.generation_time_ms, Some(1250));
        assert_eq!(msg.citations, Some(vec![]));
        assert_eq!(msg.first_text(), "ok");
    }

    #[test]
    fn unsettled_fields_are_omitted() {
        let v = serde_json::to_value(Message::model_placeholder()).unwrap();
        assert!(v.get("citations").is_none());
        assert!(v.get("generationTimeMs").is_none());
        assert_eq!(v["role"], "model");
    }
}

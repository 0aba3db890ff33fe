//! Gemini API request and response types.

use serde::{Deserialize, Serialize};
use slm_core::messages::Part;

use crate::error_parsing::ApiErrorInfo;
use crate::provider::ProviderError;
use crate::request::RequestContent;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default public API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Provider configuration.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    /// API key sent as `x-goog-api-key`.
    pub api_key: Option<String>,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Model for streamed chat answers.
    pub chat_model: String,
    /// Model for one-shot distillation.
    pub distill_model: String,
    /// Output token cap for chat requests.
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature for chat requests.
    pub temperature: Option<f64>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: "gemini-2.5-pro".to_string(),
            distill_model: "gemini-2.5-flash".to_string(),
            max_output_tokens: None,
            temperature: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request types
// ─────────────────────────────────────────────────────────────────────────────

/// One turn in Gemini form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    /// `user` or `model`.
    pub role: String,
    /// Content parts.
    pub parts: Vec<GeminiPart>,
}

impl From<&RequestContent> for GeminiContent {
    fn from(content: &RequestContent) -> Self {
        Self {
            role: content.role.as_str().to_string(),
            parts: content.parts.iter().map(GeminiPart::from).collect(),
        }
    }
}

/// A content part.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    /// Text, possibly a thought summary.
    Text {
        /// The text content.
        text: String,
        /// Set on reasoning parts, which are not part of the answer.
        #[serde(skip_serializing_if = "Option::is_none")]
        thought: Option<bool>,
    },
    /// Inline binary data.
    InlineData {
        /// The inline data details.
        #[serde(rename = "inlineData")]
        inline_data: InlineDataContent,
    },
    /// Any part shape this client does not use (function calls, etc.).
    Other(serde_json::Value),
}

impl From<&Part> for GeminiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text { text } => Self::Text {
                text: text.clone(),
                thought: None,
            },
            Part::InlineData { inline_data } => Self::InlineData {
                inline_data: InlineDataContent {
                    mime_type: inline_data.mime_type.clone(),
                    data: inline_data.data.clone(),
                },
            },
        }
    }
}

/// Inline binary data.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineDataContent {
    /// MIME type.
    pub mime_type: String,
    /// Base64-encoded data.
    pub data: String,
}

/// System instruction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemInstruction {
    /// Parts containing the instruction text.
    pub parts: Vec<SystemPart>,
}

/// A system instruction part.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemPart {
    /// Text content.
    pub text: String,
}

/// Generation config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Max output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl GenerationConfig {
    /// Whether no field is set (the config can be omitted).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_output_tokens.is_none() && self.temperature.is_none()
    }
}

/// Body of `generateContent` / `streamGenerateContent`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns.
    pub contents: Vec<GeminiContent>,
    /// System instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    /// Generation config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response types
// ─────────────────────────────────────────────────────────────────────────────

/// One streamed chunk, also the shape of a one-shot response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiStreamChunk {
    /// Response candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<GeminiCandidate>>,
    /// Token usage metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    /// Error (if any).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GeminiApiError>,
}

impl GeminiStreamChunk {
    /// Answer text of the first candidate, thought parts excluded.
    #[must_use]
    pub fn text(&self) -> String {
        self.candidates
            .as_deref()
            .and_then(<[GeminiCandidate]>::first)
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| match p {
                        GeminiPart::Text { text, thought } if *thought != Some(true) => {
                            Some(text.as_str())
                        }
                        _ => None,
                    })
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Finish reason of the first candidate.
    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .as_deref()
            .and_then(<[GeminiCandidate]>::first)
            .and_then(|c| c.finish_reason.as_deref())
    }
}

/// A response candidate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// The content of this candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<GeminiCandidateContent>,
    /// Finish reason (e.g. `STOP`, `MAX_TOKENS`, `SAFETY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Content inside a candidate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiCandidateContent {
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
    /// The role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Token usage metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Prompt token count.
    #[serde(default)]
    pub prompt_token_count: u32,
    /// Output token count.
    #[serde(default)]
    pub candidates_token_count: u32,
    /// Total token count.
    #[serde(default)]
    pub total_token_count: u32,
}

/// Error object embedded in a stream chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiApiError {
    /// HTTP-style status code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Canonical status (e.g. `RESOURCE_EXHAUSTED`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl GeminiApiError {
    /// Convert into a [`ProviderError`].
    pub fn into_provider_error(self) -> ProviderError {
        let status = u16::try_from(self.code).unwrap_or(500);
        ApiErrorInfo {
            message: self.message,
            code: self.status,
            retryable: status == 429 || status >= 500,
        }
        .into_provider_error(status, None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;
    use slm_core::messages::Role;

    use super::*;

    #[test]
    fn request_content_converts_parts() {
        let content = RequestContent {
            role: Role::Model,
            parts: vec![Part::text("hi"), Part::inline("image/png", "AA")],
        };
        let v = serde_json::to_value(GeminiContent::from(&content)).unwrap();
        assert_eq!(
            v,
            json!({
                "role": "model",
                "parts": [
                    {"text": "hi"},
                    {"inlineData": {"mimeType": "image/png", "data": "AA"}}
                ]
            })
        );
    }

    #[test]
    fn chunk_text_skips_thoughts_and_unknown_parts() {
        let chunk: GeminiStreamChunk = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Hello"},
                    {"functionCall": {"name": "f", "args": {}}},
                    {"text": " world", "thoughtSignature": "sig"}
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(chunk.text(), "Hello world");
        assert_eq!(chunk.finish_reason(), Some("STOP"));
    }

    #[test]
    fn chunk_without_candidates_has_empty_text() {
        let chunk: GeminiStreamChunk =
            serde_json::from_value(json!({"usageMetadata": {"totalTokenCount": 3}})).unwrap();
        assert_eq!(chunk.text(), "");
        assert_eq!(chunk.usage_metadata.unwrap().total_token_count, 3);
    }

    #[test]
    fn embedded_quota_error_is_rate_limited() {
        let err = GeminiApiError {
            code: 429,
            message: "Resource has been exhausted".into(),
            status: Some("RESOURCE_EXHAUSTED".into()),
        };
        assert!(err.into_provider_error().is_rate_limited());
    }

    #[test]
    fn empty_generation_config_is_detected() {
        assert!(GenerationConfig::default().is_empty());
        let cfg = GenerationConfig {
            temperature: Some(0.2),
            ..GenerationConfig::default()
        };
        assert!(!cfg.is_empty());
    }
}

//! Generation provider settings.

use serde::{Deserialize, Serialize};

/// Container for provider settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Google Gemini settings.
    pub google: GoogleApiSettings,
}

/// Google Gemini API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleApiSettings {
    /// API key. Usually supplied through the environment instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API base URL (no trailing slash).
    pub base_url: String,
    /// Model used for streamed chat answers.
    pub chat_model: String,
    /// Model used for one-shot rule distillation.
    pub distill_model: String,
    /// Output token cap sent with chat requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature sent with chat requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for GoogleApiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            chat_model: "gemini-2.5-pro".to_string(),
            distill_model: "gemini-2.5-flash".to_string(),
            max_output_tokens: None,
            temperature: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let google: GoogleApiSettings =
            serde_json::from_str(r#"{"chatModel": "gemini-2.5-flash"}"#).unwrap();
        assert_eq!(google.chat_model, "gemini-2.5-flash");
        assert_eq!(google.distill_model, "gemini-2.5-flash");
        assert!(google.base_url.starts_with("https://"));
    }

    #[test]
    fn unset_options_are_omitted() {
        let json = serde_json::to_value(GoogleApiSettings::default()).unwrap();
        assert!(json.get("apiKey").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["chatModel"], "gemini-2.5-pro");
    }
}

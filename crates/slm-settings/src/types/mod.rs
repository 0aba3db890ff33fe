//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file only needs to name the values it changes.

mod api;

pub use api::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "api": { "google": { "chatModel": "gemini-2.5-flash" } },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlmSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Provider settings.
    pub api: ApiSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Session persistence settings.
    pub session: SessionSettings,
}

impl Default for SlmSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "slm".to_string(),
            api: ApiSettings::default(),
            logging: LoggingSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl SlmSettings {
    /// Clamp out-of-range values, warning for each one changed.
    pub fn validate(&mut self) {
        let google = &mut self.api.google;
        match google.temperature {
            Some(t) if t.is_nan() => {
                tracing::warn!("temperature is NaN, unset");
                google.temperature = None;
            }
            Some(t) if !(0.0..=2.0).contains(&t) => {
                let clamped = t.clamp(0.0, 2.0);
                tracing::warn!("temperature out of range ({t}), clamped to {clamped}");
                google.temperature = Some(clamped);
            }
            _ => {}
        }
        if google.max_output_tokens == Some(0) {
            tracing::warn!("maxOutputTokens is 0, unset");
            google.max_output_tokens = None;
        }
        if google.base_url.ends_with('/') {
            google.base_url = google.base_url.trim_end_matches('/').to_string();
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Session persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Directory holding `session.json`. A leading `~` expands to `$HOME`.
    pub data_dir: String,
    /// Write the session snapshot after every change.
    pub autosave: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.slm".to_string(),
            autosave: true,
        }
    }
}

impl SessionSettings {
    /// `data_dir` with a leading `~` expanded.
    #[must_use]
    pub fn resolved_data_dir(&self) -> std::path::PathBuf {
        match self.data_dir.strip_prefix('~') {
            Some(rest) => {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                std::path::PathBuf::from(home).join(rest.trim_start_matches('/'))
            }
            None => std::path::PathBuf::from(&self.data_dir),
        }
    }
}

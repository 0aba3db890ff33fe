//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SlmSettings::default()`]
//! 2. If `~/.slm/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SLM_*` environment overrides (highest priority)
//! 4. [`SlmSettings::validate`] clamps anything out of range
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::SlmSettings;

/// Resolve the path to the settings file (`~/.slm/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".slm").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SlmSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SlmSettings> {
    let defaults = serde_json::to_value(SlmSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SlmSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut SlmSettings) {
    // ── Provider ────────────────────────────────────────────────────
    let google = &mut settings.api.google;
    if let Some(v) = read_env_string("SLM_API_KEY").or_else(|| read_env_string("GEMINI_API_KEY")) {
        google.api_key = Some(v);
    }
    if let Some(v) = read_env_string("SLM_BASE_URL") {
        google.base_url = v;
    }
    if let Some(v) = read_env_string("SLM_CHAT_MODEL") {
        google.chat_model = v;
    }
    if let Some(v) = read_env_string("SLM_DISTILL_MODEL") {
        google.distill_model = v;
    }
    if let Some(v) = read_env_u32("SLM_MAX_OUTPUT_TOKENS", 1, 1_048_576) {
        google.max_output_tokens = Some(v);
    }
    if let Some(v) = read_env_f64("SLM_TEMPERATURE", 0.0, 2.0) {
        google.temperature = Some(v);
    }

    // ── Logging / session ───────────────────────────────────────────
    if let Some(v) = read_env_string("SLM_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_string("SLM_DATA_DIR") {
        settings.session.data_dir = v;
    }
    if let Some(v) = read_env_bool("SLM_AUTOSAVE") {
        settings.session.autosave = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a finite `f64` within a range.
pub fn parse_f64_range(val: &str, min: f64, max: f64) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (n.is_finite() && (min..=max).contains(&n)).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_f64(name: &str, min: f64, max: f64) -> Option<f64> {
    let val = std::env::var(name).ok()?;
    let result = parse_f64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid f64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! # slm-settings
//!
//! Layered configuration for Social Listening LM.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SlmSettings::default()`]
//! 2. **User file**: `~/.slm/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SLM_*` overrides (highest priority)
//!
//! The global snapshot is reloadable: [`reload_settings_from_path`] swaps the
//! cached value so later [`get_settings`] calls see the new values.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// `RwLock<Option<Arc<_>>>` rather than `OnceLock` so the value can be
/// swapped on reload. Readers clone the `Arc` and keep a consistent snapshot.
static SETTINGS: RwLock<Option<Arc<SlmSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// The first call loads from `~/.slm/settings.json` with env overrides,
/// falling back to compiled defaults if loading fails.
pub fn get_settings() -> Arc<SlmSettings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    // Another thread may have initialized while we waited for the write lock.
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            SlmSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Replace the global settings with a specific value.
pub fn init_settings(settings: SlmSettings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

/// Reload settings from `path` and swap the global snapshot.
///
/// On load failure the snapshot becomes compiled defaults.
pub fn reload_settings_from_path(path: &Path) {
    let new = Arc::new(match load_settings_from_path(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, ?path, "failed to reload settings, falling back to defaults");
            SlmSettings::default()
        }
    });
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(new);
    tracing::info!(?path, "settings reloaded from disk");
}

/// Clear the cached snapshot (test-only).
#[cfg(test)]
pub(crate) fn reset_settings() {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = None;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

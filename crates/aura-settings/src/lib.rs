//! # aura-settings
//!
//! Layered configuration for Aura.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AuraSettings::default()`]
//! 2. **User file**: `~/.aura/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `AURA_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    aura_home, deep_merge, load_settings, load_settings_from_path, resolve_path, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<AuraSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads `~/.aura/settings.json` with env var overrides. If
/// loading fails, compiled defaults are used.
pub fn get_settings() -> &'static AuraSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to load settings, using defaults");
            AuraSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: AuraSettings) -> std::result::Result<(), AuraSettings> {
    SETTINGS.set(settings)
}

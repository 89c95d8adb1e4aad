//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file only needs the keys it wants to change.

mod context;
mod generation;
mod server;

pub use context::*;
pub use generation::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "context": { "tokenBudget": 4000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuraSettings {
    /// Gateway settings.
    pub server: ServerSettings,
    /// Live buffer and compression.
    pub context: ContextSettings,
    /// Speech/visual correlation.
    pub fusion: FusionSettings,
    /// Generation backend.
    pub generation: GenerationSettings,
    /// Command handling.
    pub commands: CommandSettings,
    /// Durable storage.
    pub storage: StorageSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl AuraSettings {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(SettingsError::InvalidValue(msg.to_string())) };

        if self.context.token_budget == 0 {
            return invalid("context.tokenBudget must be greater than 0");
        }
        if self.context.chars_per_token == 0 {
            return invalid("context.charsPerToken must be greater than 0");
        }
        if self.fusion.speech_window == 0 || self.fusion.visual_window == 0 {
            return invalid("fusion windows must hold at least one event");
        }
        for (name, value) in [
            ("fusion.strongConfidence", self.fusion.strong_confidence),
            ("fusion.weakConfidence", self.fusion.weak_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::InvalidValue(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.fusion.max_delta_secs < 0.0 || self.fusion.strong_delta_secs < 0.0 {
            return invalid("fusion time windows must be non-negative");
        }
        if self.storage.pool_size == 0 {
            return invalid("storage.poolSize must be greater than 0");
        }
        if self.commands.share_code_length == 0 {
            return invalid("commands.shareCodeLength must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;

    #[test]
    fn defaults_validate() {
        AuraSettings::default().validate().unwrap();
    }

    #[test]
    fn zero_budget_rejected() {
        let mut s = AuraSettings::default();
        s.context.token_budget = 0;
        let err = s.validate().unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(ref m) if m.contains("tokenBudget")));
    }

    #[test]
    fn zero_chars_per_token_rejected() {
        let mut s = AuraSettings::default();
        s.context.chars_per_token = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_window_rejected() {
        let mut s = AuraSettings::default();
        s.fusion.visual_window = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn confidence_out_of_range_rejected() {
        let mut s = AuraSettings::default();
        s.fusion.strong_confidence = 1.5;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("fusion.strongConfidence"));
    }

    #[test]
    fn serializes_camel_case_sections() {
        let json = serde_json::to_value(AuraSettings::default()).unwrap();
        assert_eq!(json["context"]["tokenBudget"], 10_000);
        assert_eq!(json["generation"]["apiKeyEnv"], "AURA_API_KEY");
        assert_eq!(json["commands"]["wakePhrase"], "hey aura");
    }
}

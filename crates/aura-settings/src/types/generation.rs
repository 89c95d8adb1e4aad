//! Generation backend and command settings.

use serde::{Deserialize, Serialize};

/// Which backend family to talk to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Any `/chat/completions` compatible endpoint.
    #[default]
    OpenaiCompatible,
    /// Deterministic in-process responses (demos, local runs).
    Mock,
}

/// Generation backend settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    /// Backend family.
    pub provider: ProviderKind,
    /// API base URL (without `/chat/completions`).
    pub base_url: String,
    /// Model for classification and compression.
    pub fast_model: String,
    /// Model for content generation.
    pub smart_model: String,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Sampling temperature.
    pub temperature: f64,
    /// Name of the env var that holds the API key.
    pub api_key_env: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenaiCompatible,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            fast_model: "llama-3.1-8b-instant".to_string(),
            smart_model: "llama-3.3-70b-versatile".to_string(),
            timeout_ms: 30_000,
            temperature: 0.7,
            api_key_env: "AURA_API_KEY".to_string(),
        }
    }
}

/// Command handling settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandSettings {
    /// Phrase a voice command must contain to be submitted.
    pub wake_phrase: String,
    /// Length of quiz share codes.
    pub share_code_length: usize,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            wake_phrase: "hey aura".to_string(),
            share_code_length: 8,
        }
    }
}

//! Context buffer, compression and fusion settings.

use serde::{Deserialize, Serialize};

/// Live buffer and compression settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextSettings {
    /// Token estimate at which a compression cycle is scheduled.
    pub token_budget: u64,
    /// Characters per estimated token.
    pub chars_per_token: usize,
    /// Live items included verbatim in command context.
    pub recent_item_limit: usize,
    /// Topics kept by the fallback compressor.
    pub fallback_topic_limit: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            token_budget: 10_000,
            chars_per_token: 4,
            recent_item_limit: 50,
            fallback_topic_limit: 10,
        }
    }
}

/// Speech/visual correlation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FusionSettings {
    /// Recent speech events retained.
    pub speech_window: usize,
    /// Recent visual events retained.
    pub visual_window: usize,
    /// Largest |Δt| in seconds that still links.
    pub max_delta_secs: f64,
    /// |Δt| below which a link counts as strong.
    pub strong_delta_secs: f64,
    /// Confidence of a strong link.
    pub strong_confidence: f64,
    /// Confidence of a weak link.
    pub weak_confidence: f64,
    /// Phrases that mark speech as pointing at the board.
    pub demonstratives: Vec<String>,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            speech_window: 10,
            visual_window: 5,
            max_delta_secs: 10.0,
            strong_delta_secs: 5.0,
            strong_confidence: 0.8,
            weak_confidence: 0.6,
            demonstratives: ["this", "here", "look at", "see", "observe", "notice", "as shown"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

//! Speech/visual fusion correlator.
//!
//! Keeps short sliding windows of a session's recent speech and whiteboard
//! events. When speech uses demonstrative language ("look at this", "as
//! shown") and a whiteboard capture landed close enough in time, the two are
//! linked with an `explains` relationship. This is a best-effort heuristic,
//! not a proof that the speaker referred to that capture.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::trace;

use aura_core::errors::CoreError;
use aura_core::fusion::{Confidence, FusionLink, Relationship};
use aura_core::ids::{FusionLinkId, SessionId, TranscriptId, WhiteboardId};
use aura_settings::FusionSettings;

/// A transcript as seen by the correlator.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeechEvent {
    /// Persisted transcript ID.
    pub id: TranscriptId,
    /// Transcript text.
    pub text: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

/// A whiteboard capture as seen by the correlator.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualEvent {
    /// Persisted whiteboard log ID.
    pub id: WhiteboardId,
    /// Recognized text, possibly empty.
    pub text: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

/// A correlation the heuristic accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct FusionMatch {
    /// Speech side.
    pub transcript_id: TranscriptId,
    /// Visual side.
    pub whiteboard_id: WhiteboardId,
    /// Always [`Relationship::Explains`] for now.
    pub relationship: Relationship,
    /// Strong or weak confidence depending on |Δt|.
    pub confidence: Confidence,
    /// |Δt| between the two events in seconds.
    pub delta_secs: f64,
    /// Speech timestamp.
    pub timestamp: DateTime<Utc>,
}

impl FusionMatch {
    /// Turn the match into a persistable link.
    pub fn into_link(self, session_id: SessionId) -> FusionLink {
        FusionLink {
            id: FusionLinkId::new(),
            session_id,
            transcript_id: self.transcript_id,
            whiteboard_id: self.whiteboard_id,
            relationship: self.relationship,
            confidence: self.confidence,
            timestamp: self.timestamp,
        }
    }
}

/// Per-session sliding windows plus the correlation heuristic.
#[derive(Debug)]
pub struct FusionCorrelator {
    // Most recent first.
    speech: VecDeque<SpeechEvent>,
    visual: VecDeque<VisualEvent>,
    speech_capacity: usize,
    visual_capacity: usize,
    markers: Vec<String>,
    max_delta_secs: f64,
    strong_delta_secs: f64,
    strong: Confidence,
    weak: Confidence,
}

impl FusionCorrelator {
    /// Build from settings. Fails if a configured confidence is outside `[0, 1]`.
    pub fn new(settings: &FusionSettings) -> Result<Self, CoreError> {
        Ok(Self {
            speech: VecDeque::with_capacity(settings.speech_window),
            visual: VecDeque::with_capacity(settings.visual_window),
            speech_capacity: settings.speech_window,
            visual_capacity: settings.visual_window,
            markers: settings
                .demonstratives
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            max_delta_secs: settings.max_delta_secs,
            strong_delta_secs: settings.strong_delta_secs,
            strong: Confidence::new(settings.strong_confidence)?,
            weak: Confidence::new(settings.weak_confidence)?,
        })
    }

    /// Record a whiteboard capture. Never produces a link.
    pub fn on_visual(&mut self, event: VisualEvent) {
        self.visual.push_front(event);
        self.visual.truncate(self.visual_capacity);
    }

    /// Record speech and link it to at most one recent capture.
    pub fn on_speech(&mut self, event: SpeechEvent) -> Option<FusionMatch> {
        let found = if self.is_demonstrative(&event.text) {
            self.correlate(&event)
        } else {
            None
        };
        self.speech.push_front(event);
        self.speech.truncate(self.speech_capacity);
        found
    }

    fn is_demonstrative(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m.as_str()))
    }

    fn correlate(&self, speech: &SpeechEvent) -> Option<FusionMatch> {
        self.visual.iter().find_map(|visual| {
            let delta_secs =
                (speech.timestamp - visual.timestamp).num_milliseconds().abs() as f64 / 1000.0;
            if delta_secs > self.max_delta_secs {
                return None;
            }
            let confidence = if delta_secs < self.strong_delta_secs {
                self.strong
            } else {
                self.weak
            };
            trace!(
                transcript_id = %speech.id,
                whiteboard_id = %visual.id,
                delta_secs,
                confidence = confidence.value(),
                "fusion match"
            );
            Some(FusionMatch {
                transcript_id: speech.id.clone(),
                whiteboard_id: visual.id.clone(),
                relationship: Relationship::Explains,
                confidence,
                delta_secs,
                timestamp: speech.timestamp,
            })
        })
    }

    /// Speech window, most recent first.
    pub fn recent_speech(&self) -> impl Iterator<Item = &SpeechEvent> {
        self.speech.iter()
    }

    /// Visual window, most recent first.
    pub fn recent_visual(&self) -> impl Iterator<Item = &VisualEvent> {
        self.visual.iter()
    }
}

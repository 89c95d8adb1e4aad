//! Compressed segments: the long-term memory of a session.
//!
//! When the live buffer fills up its contents are summarized into a
//! [`SegmentSummary`] and appended as a [`CompressedSegment`] with the next
//! sequence number. Segments are immutable once written.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::SessionId;

/// How a segment summary was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMethod {
    /// Produced by the generation backend.
    Generative,
    /// Produced by the deterministic keyword fallback.
    Fallback,
}

impl CompressionMethod {
    /// Wire/storage string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generative => "generative",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generative" => Ok(Self::Generative),
            "fallback" => Ok(Self::Fallback),
            other => Err(CoreError::UnknownVariant {
                kind: "compression method",
                value: other.to_owned(),
            }),
        }
    }
}

/// A moment where something visual was referenced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualReference {
    /// Free-form timestamp label as returned by the summarizer.
    pub timestamp: String,
    /// What was on the board.
    pub content: String,
}

/// Structured summary of one compressed buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentSummary {
    /// Ordered topics covered.
    pub topic_flow: Vec<String>,
    /// Concept name to definition.
    pub key_concepts: BTreeMap<String, String>,
    /// Visual references made during the segment.
    pub visual_references: Vec<VisualReference>,
    /// Concept dependencies, free text.
    pub dependencies: Vec<String>,
}

impl SegmentSummary {
    /// True when the summary carries no information at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topic_flow.is_empty()
            && self.key_concepts.is_empty()
            && self.visual_references.is_empty()
            && self.dependencies.is_empty()
    }
}

/// Inclusive capture-time range of the items that were compressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Timestamp of the first item.
    pub start: DateTime<Utc>,
    /// Timestamp of the last item.
    pub end: DateTime<Utc>,
}

/// An immutable, sequenced summary of a past buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedSegment {
    /// Owning session.
    pub session_id: SessionId,
    /// 1-based, gapless within a session.
    pub sequence: u32,
    /// Time span covered (absent if the compressed buffer was empty).
    pub time_range: Option<TimeRange>,
    /// Token estimate of the compressed buffer.
    pub token_count: u64,
    /// Generative or fallback.
    pub method: CompressionMethod,
    /// The summary itself.
    pub summary: SegmentSummary,
    /// When the segment was written.
    pub created_at: DateTime<Utc>,
}

impl CompressedSegment {
    /// Render as a block of command context.
    ///
    /// ```text
    /// --- Segment 2 ---
    /// Topics: osmosis, diffusion
    /// - osmosis: water crossing a membrane
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("--- Segment {} ---\n", self.sequence);
        out.push_str("Topics: ");
        out.push_str(&self.summary.topic_flow.join(", "));
        out.push('\n');
        for (concept, definition) in &self.summary.key_concepts {
            out.push_str("- ");
            out.push_str(concept);
            out.push_str(": ");
            out.push_str(definition);
            out.push('\n');
        }
        out
    }
}

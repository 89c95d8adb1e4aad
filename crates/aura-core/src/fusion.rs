//! Links between what was said and what was on the board.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::{FusionLinkId, SessionId, TranscriptId, WhiteboardId};

/// How a speech event relates to the visual it was linked to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// The speech explains the visual.
    Explains,
}

impl Relationship {
    /// Wire/storage string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explains => "explains",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explains" => Ok(Self::Explains),
            other => Err(CoreError::UnknownVariant {
                kind: "relationship",
                value: other.to_owned(),
            }),
        }
    }
}

/// Validated confidence in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Validate a raw value.
    pub fn new(value: f64) -> Result<Self, CoreError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::ConfidenceOutOfRange(value))
        }
    }

    /// Raw value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = CoreError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

/// A persisted speech-to-visual association.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionLink {
    /// Link ID.
    pub id: FusionLinkId,
    /// Session both referenced events belong to.
    pub session_id: SessionId,
    /// The speech side.
    pub transcript_id: TranscriptId,
    /// The visual side.
    pub whiteboard_id: WhiteboardId,
    /// Relationship kind.
    pub relationship: Relationship,
    /// How sure the correlator is.
    pub confidence: Confidence,
    /// Timestamp of the speech event.
    pub timestamp: DateTime<Utc>,
}

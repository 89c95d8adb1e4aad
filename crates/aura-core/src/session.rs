//! Classroom sessions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::SessionId;

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting speech, visuals and commands.
    Active,
    /// Temporarily closed to ingestion; commands still answer from context.
    Paused,
    /// Ended. No further ingestion.
    Completed,
}

impl SessionStatus {
    /// Wire/storage string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Whether new speech/visual events may be ingested.
    #[must_use]
    pub fn accepts_ingestion(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(CoreError::UnknownVariant {
                kind: "session status",
                value: other.to_owned(),
            }),
        }
    }
}

/// A persisted classroom session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session ID.
    pub id: SessionId,
    /// Subject being taught (free text).
    pub subject: String,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// When the session started.
    pub start_time: DateTime<Utc>,
    /// When the session ended, if it has.
    pub end_time: Option<DateTime<Utc>>,
    /// Last persisted token estimate of the live buffer.
    pub active_buffer_tokens: u64,
    /// Opaque client metadata.
    pub metadata: Option<serde_json::Value>,
}

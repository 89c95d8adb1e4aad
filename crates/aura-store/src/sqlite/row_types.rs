//! Raw row shapes and conversions to domain types.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`),
//! so lexicographic order is chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use aura_core::commands::{Command, CommandStatus, Intent, Quiz};
use aura_core::fusion::{Confidence, FusionLink, Relationship};
use aura_core::ids::{CommandId, FusionLinkId, QuizId, SessionId, TranscriptId, WhiteboardId};
use aura_core::segments::{CompressedSegment, CompressionMethod, SegmentSummary, TimeRange};
use aura_core::session::{Session, SessionStatus};

use crate::errors::{Result, StoreError};

/// Format a timestamp for storage.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

fn parse_opt_ts(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}

fn parse_enum<T: std::str::FromStr<Err = aura_core::CoreError>>(raw: &str) -> Result<T> {
    raw.parse().map_err(|e: aura_core::CoreError| StoreError::Corrupt(e.to_string()))
}

fn non_negative(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

/// Raw `sessions` row.
#[derive(Clone, Debug)]
pub struct SessionRow {
    /// Session ID.
    pub id: String,
    /// Subject.
    pub subject: String,
    /// Status text.
    pub status: String,
    /// Start timestamp.
    pub start_time: String,
    /// End timestamp.
    pub end_time: Option<String>,
    /// Persisted buffer token estimate.
    pub active_buffer_tokens: i64,
    /// Metadata JSON text.
    pub metadata: Option<String>,
}

impl SessionRow {
    /// Decode into a [`Session`].
    pub fn into_domain(self) -> Result<Session> {
        Ok(Session {
            id: SessionId::from_raw(self.id),
            subject: self.subject,
            status: parse_enum::<SessionStatus>(&self.status)?,
            start_time: parse_ts(&self.start_time)?,
            end_time: parse_opt_ts(self.end_time.as_deref())?,
            active_buffer_tokens: non_negative(self.active_buffer_tokens, "active_buffer_tokens")?,
            metadata: self.metadata.as_deref().map(serde_json::from_str).transpose()?,
        })
    }
}

/// Raw `compressed_segments` row.
#[derive(Clone, Debug)]
pub struct SegmentRow {
    /// Owning session.
    pub session_id: String,
    /// Sequence number.
    pub segment_num: i64,
    /// First item timestamp.
    pub range_start: Option<String>,
    /// Last item timestamp.
    pub range_end: Option<String>,
    /// Token estimate.
    pub token_count: i64,
    /// Method text.
    pub compression_method: String,
    /// Summary JSON text.
    pub summary: String,
    /// Write timestamp.
    pub created_at: String,
}

impl SegmentRow {
    /// Decode into a [`CompressedSegment`].
    pub fn into_domain(self) -> Result<CompressedSegment> {
        let time_range = match (self.range_start, self.range_end) {
            (Some(start), Some(end)) => Some(TimeRange {
                start: parse_ts(&start)?,
                end: parse_ts(&end)?,
            }),
            _ => None,
        };
        Ok(CompressedSegment {
            session_id: SessionId::from_raw(self.session_id),
            sequence: u32::try_from(self.segment_num)
                .map_err(|_| StoreError::Corrupt(format!("bad segment_num {}", self.segment_num)))?,
            time_range,
            token_count: non_negative(self.token_count, "token_count")?,
            method: parse_enum::<CompressionMethod>(&self.compression_method)?,
            summary: serde_json::from_str::<SegmentSummary>(&self.summary)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

/// Raw `fusion_links` row.
#[derive(Clone, Debug)]
pub struct FusionLinkRow {
    /// Link ID.
    pub id: String,
    /// Session ID.
    pub session_id: String,
    /// Transcript ID.
    pub transcript_id: String,
    /// Whiteboard ID.
    pub whiteboard_id: String,
    /// Relationship text.
    pub relationship: String,
    /// Confidence.
    pub confidence: f64,
    /// Speech timestamp.
    pub timestamp: String,
}

impl FusionLinkRow {
    /// Decode into a [`FusionLink`].
    pub fn into_domain(self) -> Result<FusionLink> {
        Ok(FusionLink {
            id: FusionLinkId::from_raw(self.id),
            session_id: SessionId::from_raw(self.session_id),
            transcript_id: TranscriptId::from_raw(self.transcript_id),
            whiteboard_id: WhiteboardId::from_raw(self.whiteboard_id),
            relationship: parse_enum::<Relationship>(&self.relationship)?,
            confidence: Confidence::new(self.confidence)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            timestamp: parse_ts(&self.timestamp)?,
        })
    }
}

/// Raw `commands` row.
#[derive(Clone, Debug)]
pub struct CommandRow {
    /// Command ID.
    pub id: String,
    /// Session ID.
    pub session_id: String,
    /// Raw command text.
    pub raw_text: String,
    /// Intent text, once classified.
    pub intent: Option<String>,
    /// Status text.
    pub status: String,
    /// Response JSON text.
    pub response: Option<String>,
    /// Processing time.
    pub processing_time_ms: Option<i64>,
    /// Failure reason.
    pub error_message: Option<String>,
    /// Issue timestamp.
    pub timestamp: String,
}

impl CommandRow {
    /// Decode into a [`Command`].
    pub fn into_domain(self) -> Result<Command> {
        Ok(Command {
            id: CommandId::from_raw(self.id),
            session_id: SessionId::from_raw(self.session_id),
            raw_text: self.raw_text,
            intent: self.intent.as_deref().map(parse_enum::<Intent>).transpose()?,
            status: parse_enum::<CommandStatus>(&self.status)?,
            response: self.response.as_deref().map(serde_json::from_str).transpose()?,
            processing_time_ms: self
                .processing_time_ms
                .map(|ms| non_negative(ms, "processing_time_ms"))
                .transpose()?,
            error_message: self.error_message,
            timestamp: parse_ts(&self.timestamp)?,
        })
    }
}

/// Raw `quizzes` row.
#[derive(Clone, Debug)]
pub struct QuizRow {
    /// Quiz ID.
    pub id: String,
    /// Session ID.
    pub session_id: String,
    /// Command ID.
    pub command_id: String,
    /// Share code.
    pub share_code: String,
    /// Quiz JSON text.
    pub quiz_data: String,
    /// Write timestamp.
    pub created_at: String,
}

impl QuizRow {
    /// Decode into a [`Quiz`].
    pub fn into_domain(self) -> Result<Quiz> {
        Ok(Quiz {
            id: QuizId::from_raw(self.id),
            session_id: SessionId::from_raw(self.session_id),
            command_id: CommandId::from_raw(self.command_id),
            share_code: self.share_code,
            data: serde_json::from_str(&self.quiz_data)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

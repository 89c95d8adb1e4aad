//! Transcript repository.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use aura_core::ids::{SessionId, TranscriptId};

use crate::errors::Result;
use crate::sqlite::row_types::{format_ts, parse_ts};

/// A persisted speech transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// Row ID.
    pub id: TranscriptId,
    /// Owning session.
    pub session_id: SessionId,
    /// Recognized text.
    pub text: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Recognizer confidence.
    pub confidence: f64,
}

/// Transcript repository.
pub struct TranscriptRepo;

impl TranscriptRepo {
    /// Insert a transcript.
    pub fn insert(conn: &Connection, transcript: &Transcript) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO transcripts (id, session_id, text, timestamp, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                transcript.id.as_str(),
                transcript.session_id.as_str(),
                transcript.text,
                format_ts(transcript.timestamp),
                transcript.confidence,
                format_ts(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Transcripts of a session in capture order.
    pub fn list(conn: &Connection, session_id: &SessionId) -> Result<Vec<Transcript>> {
        let mut stmt = conn.prepare(
            "SELECT id, text, timestamp, confidence FROM transcripts
             WHERE session_id = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, text, ts, confidence)| {
                Ok(Transcript {
                    id: TranscriptId::from_raw(id),
                    session_id: session_id.clone(),
                    text,
                    timestamp: parse_ts(&ts)?,
                    confidence,
                })
            })
            .collect()
    }
}

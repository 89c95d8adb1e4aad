//! Session repository: lifecycle and the persisted buffer token count.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use aura_core::ids::SessionId;
use aura_core::session::{Session, SessionStatus};

use crate::errors::Result;
use crate::sqlite::row_types::{SessionRow, format_ts};

/// Session repository.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new `active` session.
    pub fn create(
        conn: &Connection,
        subject: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<Session> {
        let id = SessionId::new();
        let now = Utc::now();
        let metadata_json = metadata.map(serde_json::to_string).transpose()?;

        let _ = conn.execute(
            "INSERT INTO sessions (id, subject, status, start_time, metadata, created_at)
             VALUES (?1, ?2, 'active', ?3, ?4, ?3)",
            params![id.as_str(), subject, format_ts(now), metadata_json],
        )?;

        Ok(Session {
            id,
            subject: subject.to_string(),
            status: SessionStatus::Active,
            start_time: now,
            end_time: None,
            active_buffer_tokens: 0,
            metadata: metadata.cloned(),
        })
    }

    /// Get a session by ID.
    pub fn get(conn: &Connection, id: &SessionId) -> Result<Option<Session>> {
        conn.query_row(
            "SELECT id, subject, status, start_time, end_time, active_buffer_tokens, metadata
             FROM sessions WHERE id = ?1",
            params![id.as_str()],
            Self::map_row,
        )
        .optional()?
        .map(SessionRow::into_domain)
        .transpose()
    }

    /// Whether the session row exists.
    pub fn exists(conn: &Connection, id: &SessionId) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sessions WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// List sessions, newest first, optionally filtered by status.
    pub fn list(conn: &Connection, status: Option<SessionStatus>) -> Result<Vec<Session>> {
        let mut stmt = conn.prepare(
            "SELECT id, subject, status, start_time, end_time, active_buffer_tokens, metadata
             FROM sessions
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY start_time DESC",
        )?;
        let rows = stmt
            .query_map(params![status.map(SessionStatus::as_str)], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(SessionRow::into_domain).collect()
    }

    /// Set status. Ending goes through [`Self::mark_completed`].
    pub fn set_status(conn: &Connection, id: &SessionId, status: SessionStatus) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET status = ?1 WHERE id = ?2 AND status != 'completed'",
            params![status.as_str(), id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Mark completed with an end time. Returns false if missing or already completed.
    pub fn mark_completed(conn: &Connection, id: &SessionId) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET status = 'completed', end_time = ?1
             WHERE id = ?2 AND status != 'completed'",
            params![format_ts(Utc::now()), id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Persist the live buffer's token estimate.
    pub fn set_buffer_tokens(conn: &Connection, id: &SessionId, tokens: u64) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET active_buffer_tokens = ?1 WHERE id = ?2",
            params![tokens as i64, id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Delete a session. Owned rows cascade.
    pub fn delete(conn: &Connection, id: &SessionId) -> Result<bool> {
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()])?;
        Ok(changed > 0)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get(0)?,
            subject: row.get(1)?,
            status: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            active_buffer_tokens: row.get(5)?,
            metadata: row.get(6)?,
        })
    }
}

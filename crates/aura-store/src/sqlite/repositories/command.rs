//! Command repository.
//!
//! Every status change is checked against [`CommandStatus::transition_to`]
//! and then applied as a compare-and-set on the status that was read, so a
//! command can never leave a terminal state or skip `processing` on the way
//! to `completed`, even with concurrent writers.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use aura_core::commands::{Command, CommandStatus, Intent};
use aura_core::ids::{CommandId, SessionId};

use crate::errors::{Result, StoreError};
use crate::sqlite::row_types::{CommandRow, format_ts};

const COLUMNS: &str = "id, session_id, raw_text, intent, status, response, processing_time_ms,
                       error_message, timestamp";

/// Command repository.
pub struct CommandRepo;

impl CommandRepo {
    /// Insert a new `pending` command.
    pub fn insert_pending(
        conn: &Connection,
        session_id: &SessionId,
        raw_text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Command> {
        let id = CommandId::new();
        let _ = conn.execute(
            "INSERT INTO commands (id, session_id, raw_text, status, timestamp, updated_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5)",
            params![
                id.as_str(),
                session_id.as_str(),
                raw_text,
                format_ts(timestamp),
                format_ts(Utc::now()),
            ],
        )?;
        Ok(Command {
            id,
            session_id: session_id.clone(),
            raw_text: raw_text.to_string(),
            intent: None,
            status: CommandStatus::Pending,
            response: None,
            processing_time_ms: None,
            error_message: None,
            timestamp,
        })
    }

    /// Get a command by ID.
    pub fn get(conn: &Connection, id: &CommandId) -> Result<Option<Command>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM commands WHERE id = ?1"),
            params![id.as_str()],
            Self::map_row,
        )
        .optional()?
        .map(CommandRow::into_domain)
        .transpose()
    }

    /// Commands of a session in issue order.
    pub fn list(conn: &Connection, session_id: &SessionId) -> Result<Vec<Command>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM commands WHERE session_id = ?1 ORDER BY timestamp ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(CommandRow::into_domain).collect()
    }

    /// `pending -> processing`, recording the intent.
    pub fn mark_processing(conn: &Connection, id: &CommandId, intent: Intent) -> Result<()> {
        let from = Self::check_transition(conn, id, CommandStatus::Processing)?;
        let changed = conn.execute(
            "UPDATE commands SET status = 'processing', intent = ?1, updated_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![intent.as_str(), format_ts(Utc::now()), id.as_str(), from.as_str()],
        )?;
        Self::expect_one(changed, id, from, CommandStatus::Processing)
    }

    /// `processing -> completed`, recording the response.
    pub fn mark_completed(
        conn: &Connection,
        id: &CommandId,
        response: &serde_json::Value,
        processing_time_ms: u64,
    ) -> Result<()> {
        let from = Self::check_transition(conn, id, CommandStatus::Completed)?;
        let changed = conn.execute(
            "UPDATE commands
             SET status = 'completed', response = ?1, processing_time_ms = ?2, updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                serde_json::to_string(response)?,
                processing_time_ms as i64,
                format_ts(Utc::now()),
                id.as_str(),
                from.as_str(),
            ],
        )?;
        Self::expect_one(changed, id, from, CommandStatus::Completed)
    }

    /// `pending | processing -> failed`, recording the reason.
    ///
    /// `pending -> failed` is taken when the command could not even be moved
    /// to `processing`.
    pub fn mark_failed(
        conn: &Connection,
        id: &CommandId,
        error_message: &str,
        processing_time_ms: u64,
    ) -> Result<()> {
        let from = Self::check_transition(conn, id, CommandStatus::Failed)?;
        let changed = conn.execute(
            "UPDATE commands
             SET status = 'failed', error_message = ?1, processing_time_ms = ?2, updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                error_message,
                processing_time_ms as i64,
                format_ts(Utc::now()),
                id.as_str(),
                from.as_str(),
            ],
        )?;
        Self::expect_one(changed, id, from, CommandStatus::Failed)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<CommandRow> {
        Ok(CommandRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            raw_text: row.get(2)?,
            intent: row.get(3)?,
            status: row.get(4)?,
            response: row.get(5)?,
            processing_time_ms: row.get(6)?,
            error_message: row.get(7)?,
            timestamp: row.get(8)?,
        })
    }

    /// Current status of `id`, if it may move to `to`.
    fn check_transition(conn: &Connection, id: &CommandId, to: CommandStatus) -> Result<CommandStatus> {
        let from: String = conn
            .query_row(
                "SELECT status FROM commands WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::CommandNotFound(id.to_string()))?;
        let from: CommandStatus = from.parse().map_err(|_| invalid(id, &from, to))?;
        let _ = from.transition_to(to).map_err(|_| invalid(id, from.as_str(), to))?;
        Ok(from)
    }

    /// A zero row count means another writer moved the command first.
    fn expect_one(changed: usize, id: &CommandId, from: CommandStatus, to: CommandStatus) -> Result<()> {
        if changed == 1 {
            Ok(())
        } else {
            Err(invalid(id, from.as_str(), to))
        }
    }
}

fn invalid(id: &CommandId, from: &str, to: CommandStatus) -> StoreError {
    StoreError::InvalidTransition {
        command_id: id.to_string(),
        from: from.to_owned(),
        to: to.as_str().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::repositories::test_support::{conn, session};
    use assert_matches::assert_matches;

    #[test]
    fn happy_path() {
        let conn = conn();
        let sid = session(&conn);
        let cmd = CommandRepo::insert_pending(&conn, &sid, "give me a quiz", Utc::now()).unwrap();
        assert_eq!(cmd.status, CommandStatus::Pending);

        CommandRepo::mark_processing(&conn, &cmd.id, Intent::GenerateQuiz).unwrap();
        let response = serde_json::json!({"title": "Cells"});
        CommandRepo::mark_completed(&conn, &cmd.id, &response, 120).unwrap();

        let stored = CommandRepo::get(&conn, &cmd.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Completed);
        assert_eq!(stored.intent, Some(Intent::GenerateQuiz));
        assert_eq!(stored.response, Some(response));
        assert_eq!(stored.processing_time_ms, Some(120));
        assert!(stored.error_message.is_none());
    }

    #[test]
    fn cannot_complete_from_pending() {
        let conn = conn();
        let sid = session(&conn);
        let cmd = CommandRepo::insert_pending(&conn, &sid, "summarize", Utc::now()).unwrap();
        assert_matches!(
            CommandRepo::mark_completed(&conn, &cmd.id, &serde_json::json!({}), 1),
            Err(StoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn pending_can_fail_directly() {
        let conn = conn();
        let sid = session(&conn);
        let cmd = CommandRepo::insert_pending(&conn, &sid, "quiz", Utc::now()).unwrap();
        CommandRepo::mark_failed(&conn, &cmd.id, "could not classify", 3).unwrap();

        let stored = CommandRepo::get(&conn, &cmd.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Failed);
        assert!(stored.intent.is_none());
    }

    #[test]
    fn refused_transition_names_both_statuses() {
        let conn = conn();
        let sid = session(&conn);
        let cmd = CommandRepo::insert_pending(&conn, &sid, "quiz", Utc::now()).unwrap();
        CommandRepo::mark_failed(&conn, &cmd.id, "gave up", 3).unwrap();
        assert_matches!(
            CommandRepo::mark_processing(&conn, &cmd.id, Intent::GenerateQuiz),
            Err(StoreError::InvalidTransition { from, to, .. }) if from == "failed" && to == "processing"
        );
    }

    #[test]
    fn terminal_is_final() {
        let conn = conn();
        let sid = session(&conn);
        let cmd = CommandRepo::insert_pending(&conn, &sid, "summarize", Utc::now()).unwrap();
        CommandRepo::mark_processing(&conn, &cmd.id, Intent::Summarize).unwrap();
        CommandRepo::mark_failed(&conn, &cmd.id, "generation timed out", 30_000).unwrap();

        assert!(CommandRepo::mark_processing(&conn, &cmd.id, Intent::Summarize).is_err());
        assert!(CommandRepo::mark_failed(&conn, &cmd.id, "again", 1).is_err());

        let stored = CommandRepo::get(&conn, &cmd.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("generation timed out"));
    }

    #[test]
    fn missing_command_is_not_found() {
        let conn = conn();
        assert_matches!(
            CommandRepo::mark_processing(&conn, &CommandId::from("nope"), Intent::Other),
            Err(StoreError::CommandNotFound(_))
        );
    }

    #[test]
    fn list_in_issue_order() {
        let conn = conn();
        let sid = session(&conn);
        let t0 = Utc::now();
        let second = CommandRepo::insert_pending(&conn, &sid, "b", t0 + chrono::Duration::seconds(1)).unwrap();
        let first = CommandRepo::insert_pending(&conn, &sid, "a", t0).unwrap();
        let ids: Vec<_> = CommandRepo::list(&conn, &sid).unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }
}

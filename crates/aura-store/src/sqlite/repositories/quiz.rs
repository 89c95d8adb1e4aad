//! Quiz repository.

use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use aura_core::commands::Quiz;
use aura_core::ids::SessionId;

use crate::errors::{Result, StoreError};
use crate::sqlite::row_types::{QuizRow, format_ts};

/// Quiz repository.
pub struct QuizRepo;

impl QuizRepo {
    /// Insert a quiz. A share code collision yields [`StoreError::ShareCodeTaken`].
    pub fn insert(conn: &Connection, quiz: &Quiz) -> Result<()> {
        let result = conn.execute(
            "INSERT INTO quizzes (id, session_id, command_id, share_code, quiz_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                quiz.id.as_str(),
                quiz.session_id.as_str(),
                quiz.command_id.as_str(),
                quiz.share_code,
                serde_json::to_string(&quiz.data)?,
                format_ts(quiz.created_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, Some(msg)))
                if e.code == ErrorCode::ConstraintViolation && msg.contains("share_code") =>
            {
                Err(StoreError::ShareCodeTaken(quiz.share_code.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look a quiz up by its share code.
    pub fn get_by_share_code(conn: &Connection, share_code: &str) -> Result<Option<Quiz>> {
        conn.query_row(
            "SELECT id, session_id, command_id, share_code, quiz_data, created_at
             FROM quizzes WHERE share_code = ?1",
            params![share_code],
            Self::map_row,
        )
        .optional()?
        .map(QuizRow::into_domain)
        .transpose()
    }

    /// Quizzes of a session, oldest first.
    pub fn list(conn: &Connection, session_id: &SessionId) -> Result<Vec<Quiz>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, command_id, share_code, quiz_data, created_at
             FROM quizzes WHERE session_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(QuizRow::into_domain).collect()
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<QuizRow> {
        Ok(QuizRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            command_id: row.get(2)?,
            share_code: row.get(3)?,
            quiz_data: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::repositories::command::CommandRepo;
    use crate::sqlite::repositories::test_support::{conn, session};
    use assert_matches::assert_matches;
    use aura_core::ids::QuizId;
    use chrono::Utc;

    fn quiz(conn: &Connection, sid: &SessionId, code: &str) -> Quiz {
        let cmd = CommandRepo::insert_pending(conn, sid, "quiz me", Utc::now()).unwrap();
        Quiz {
            id: QuizId::new(),
            session_id: sid.clone(),
            command_id: cmd.id,
            share_code: code.to_string(),
            data: serde_json::json!({"questions": [{"question": "2+2?"}]}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_lookup_by_code() {
        let conn = conn();
        let sid = session(&conn);
        let q = quiz(&conn, &sid, "AB12CD34");
        QuizRepo::insert(&conn, &q).unwrap();

        let found = QuizRepo::get_by_share_code(&conn, "AB12CD34").unwrap().unwrap();
        assert_eq!(found.id, q.id);
        assert_eq!(found.data["questions"][0]["question"], "2+2?");
        assert!(QuizRepo::get_by_share_code(&conn, "ZZZZZZZZ").unwrap().is_none());
        assert_eq!(QuizRepo::list(&conn, &sid).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_code_is_share_code_taken() {
        let conn = conn();
        let sid = session(&conn);
        QuizRepo::insert(&conn, &quiz(&conn, &sid, "DUPL1CAT")).unwrap();
        assert_matches!(
            QuizRepo::insert(&conn, &quiz(&conn, &sid, "DUPL1CAT")),
            Err(StoreError::ShareCodeTaken(code)) if code == "DUPL1CAT"
        );
    }
}

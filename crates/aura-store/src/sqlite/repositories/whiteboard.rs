//! Whiteboard log repository.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use aura_core::ids::{SessionId, WhiteboardId};

use crate::errors::Result;
use crate::sqlite::row_types::{format_ts, parse_ts};

/// A persisted whiteboard snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardLog {
    /// Row ID.
    pub id: WhiteboardId,
    /// Owning session.
    pub session_id: SessionId,
    /// Opaque canvas snapshot.
    pub snapshot: serde_json::Value,
    /// Rendered image reference (URL or path).
    pub image_ref: String,
    /// Recognized text; may be empty.
    pub ocr_text: String,
    /// Board page.
    pub page_number: u32,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

/// Whiteboard log repository.
pub struct WhiteboardRepo;

impl WhiteboardRepo {
    /// Insert a whiteboard log.
    pub fn insert(conn: &Connection, log: &WhiteboardLog) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO whiteboard_logs
               (id, session_id, snapshot, image_ref, ocr_text, page_number, timestamp, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                log.id.as_str(),
                log.session_id.as_str(),
                serde_json::to_string(&log.snapshot)?,
                log.image_ref,
                log.ocr_text,
                log.page_number,
                format_ts(log.timestamp),
                format_ts(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Whiteboard logs of a session in capture order.
    pub fn list(conn: &Connection, session_id: &SessionId) -> Result<Vec<WhiteboardLog>> {
        let mut stmt = conn.prepare(
            "SELECT id, snapshot, image_ref, ocr_text, page_number, timestamp
             FROM whiteboard_logs WHERE session_id = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, snapshot, image_ref, ocr_text, page_number, ts)| {
                Ok(WhiteboardLog {
                    id: WhiteboardId::from_raw(id),
                    session_id: session_id.clone(),
                    snapshot: serde_json::from_str(&snapshot)?,
                    image_ref,
                    ocr_text,
                    page_number,
                    timestamp: parse_ts(&ts)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::repositories::test_support::{conn, session};

    #[test]
    fn empty_ocr_is_persisted() {
        let conn = conn();
        let sid = session(&conn);
        let log = WhiteboardLog {
            id: WhiteboardId::new(),
            session_id: sid.clone(),
            snapshot: serde_json::json!({"shapes": []}),
            image_ref: "/boards/1.png".into(),
            ocr_text: String::new(),
            page_number: 2,
            timestamp: Utc::now(),
        };
        WhiteboardRepo::insert(&conn, &log).unwrap();
        let listed = WhiteboardRepo::list(&conn, &sid).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, log.id);
        assert_eq!(listed[0].ocr_text, "");
        assert_eq!(listed[0].page_number, 2);
        assert_eq!(listed[0].snapshot, log.snapshot);
    }
}

//! Fusion link repository.

use chrono::Utc;
use rusqlite::{Connection, Row, params};

use aura_core::fusion::FusionLink;
use aura_core::ids::SessionId;

use crate::errors::{Result, StoreError};
use crate::sqlite::row_types::{FusionLinkRow, format_ts};

/// Fusion link repository.
pub struct FusionRepo;

impl FusionRepo {
    /// Insert a link. Both referenced rows must belong to the link's session.
    pub fn insert(conn: &Connection, link: &FusionLink) -> Result<()> {
        let inserted = conn.execute(
            "INSERT INTO fusion_links
               (id, session_id, transcript_id, whiteboard_id, relationship, confidence,
                timestamp, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
             WHERE EXISTS (SELECT 1 FROM transcripts WHERE id = ?3 AND session_id = ?2)
               AND EXISTS (SELECT 1 FROM whiteboard_logs WHERE id = ?4 AND session_id = ?2)",
            params![
                link.id.as_str(),
                link.session_id.as_str(),
                link.transcript_id.as_str(),
                link.whiteboard_id.as_str(),
                link.relationship.as_str(),
                link.confidence.value(),
                format_ts(link.timestamp),
                format_ts(Utc::now()),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Integrity(format!(
                "fusion link {} references events outside session {}",
                link.id, link.session_id
            )));
        }
        Ok(())
    }

    /// Links of a session in speech-time order.
    pub fn list(conn: &Connection, session_id: &SessionId) -> Result<Vec<FusionLink>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, transcript_id, whiteboard_id, relationship, confidence, timestamp
             FROM fusion_links WHERE session_id = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(FusionLinkRow::into_domain).collect()
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<FusionLinkRow> {
        Ok(FusionLinkRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            transcript_id: row.get(2)?,
            whiteboard_id: row.get(3)?,
            relationship: row.get(4)?,
            confidence: row.get(5)?,
            timestamp: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::repositories::test_support::{conn, session};
    use crate::sqlite::repositories::transcript::{Transcript, TranscriptRepo};
    use crate::sqlite::repositories::whiteboard::{WhiteboardLog, WhiteboardRepo};
    use assert_matches::assert_matches;
    use aura_core::fusion::{Confidence, Relationship};
    use aura_core::ids::{FusionLinkId, TranscriptId, WhiteboardId};
    use chrono::Utc;

    fn transcript(conn: &Connection, sid: &SessionId) -> TranscriptId {
        let t = Transcript {
            id: TranscriptId::new(),
            session_id: sid.clone(),
            text: "notice this curve".into(),
            timestamp: Utc::now(),
            confidence: 0.9,
        };
        TranscriptRepo::insert(conn, &t).unwrap();
        t.id
    }

    fn board(conn: &Connection, sid: &SessionId) -> WhiteboardId {
        let w = WhiteboardLog {
            id: WhiteboardId::new(),
            session_id: sid.clone(),
            snapshot: serde_json::json!({}),
            image_ref: String::new(),
            ocr_text: "y = x^2".into(),
            page_number: 1,
            timestamp: Utc::now(),
        };
        WhiteboardRepo::insert(conn, &w).unwrap();
        w.id
    }

    fn link(sid: &SessionId, t: TranscriptId, w: WhiteboardId) -> FusionLink {
        FusionLink {
            id: FusionLinkId::new(),
            session_id: sid.clone(),
            transcript_id: t,
            whiteboard_id: w,
            relationship: Relationship::Explains,
            confidence: Confidence::new(0.8).unwrap(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn insert_and_list() {
        let conn = conn();
        let sid = session(&conn);
        let (t, w) = (transcript(&conn, &sid), board(&conn, &sid));
        FusionRepo::insert(&conn, &link(&sid, t.clone(), w)).unwrap();

        let links = FusionRepo::list(&conn, &sid).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].transcript_id, t);
        assert!((links[0].confidence.value() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn cross_session_link_rejected() {
        let conn = conn();
        let a = session(&conn);
        let b = session(&conn);
        let t = transcript(&conn, &a);
        let w = board(&conn, &b);
        assert_matches!(
            FusionRepo::insert(&conn, &link(&a, t, w)),
            Err(StoreError::Integrity(_))
        );
    }
}

//! Compressed segment repository. Append-only.

use rusqlite::{Connection, Row, params};

use aura_core::ids::SessionId;
use aura_core::segments::CompressedSegment;

use crate::errors::Result;
use crate::sqlite::row_types::{SegmentRow, format_ts};

/// Segment repository.
pub struct SegmentRepo;

impl SegmentRepo {
    /// Next sequence number for a session (1 for the first segment).
    pub fn next_sequence(conn: &Connection, session_id: &SessionId) -> Result<u32> {
        let max: u32 = conn.query_row(
            "SELECT COALESCE(MAX(segment_num), 0) FROM compressed_segments WHERE session_id = ?1",
            params![session_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    /// Insert a segment. The `(session_id, sequence)` pair must be new.
    pub fn insert(conn: &Connection, segment: &CompressedSegment) -> Result<()> {
        let summary = serde_json::to_string(&segment.summary)?;
        let _ = conn.execute(
            "INSERT INTO compressed_segments
               (session_id, segment_num, range_start, range_end, token_count,
                compression_method, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                segment.session_id.as_str(),
                segment.sequence,
                segment.time_range.map(|r| format_ts(r.start)),
                segment.time_range.map(|r| format_ts(r.end)),
                segment.token_count as i64,
                segment.method.as_str(),
                summary,
                format_ts(segment.created_at),
            ],
        )?;
        Ok(())
    }

    /// All segments of a session in sequence order.
    pub fn list(conn: &Connection, session_id: &SessionId) -> Result<Vec<CompressedSegment>> {
        let mut stmt = conn.prepare(
            "SELECT session_id, segment_num, range_start, range_end, token_count,
                    compression_method, summary, created_at
             FROM compressed_segments
             WHERE session_id = ?1
             ORDER BY segment_num ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(SegmentRow::into_domain).collect()
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<SegmentRow> {
        Ok(SegmentRow {
            session_id: row.get(0)?,
            segment_num: row.get(1)?,
            range_start: row.get(2)?,
            range_end: row.get(3)?,
            token_count: row.get(4)?,
            compression_method: row.get(5)?,
            summary: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::repositories::test_support::{conn, session};
    use aura_core::segments::{CompressionMethod, SegmentSummary, TimeRange};
    use chrono::Utc;

    fn segment(session_id: &SessionId, sequence: u32) -> CompressedSegment {
        let now = Utc::now();
        CompressedSegment {
            session_id: session_id.clone(),
            sequence,
            time_range: Some(TimeRange { start: now, end: now }),
            token_count: 120,
            method: CompressionMethod::Fallback,
            summary: SegmentSummary {
                topic_flow: vec!["mitosis".into()],
                ..SegmentSummary::default()
            },
            created_at: now,
        }
    }

    #[test]
    fn sequence_starts_at_one_and_advances() {
        let conn = conn();
        let sid = session(&conn);
        assert_eq!(SegmentRepo::next_sequence(&conn, &sid).unwrap(), 1);
        SegmentRepo::insert(&conn, &segment(&sid, 1)).unwrap();
        assert_eq!(SegmentRepo::next_sequence(&conn, &sid).unwrap(), 2);
    }

    #[test]
    fn duplicate_sequence_rejected() {
        let conn = conn();
        let sid = session(&conn);
        SegmentRepo::insert(&conn, &segment(&sid, 1)).unwrap();
        assert!(SegmentRepo::insert(&conn, &segment(&sid, 1)).is_err());
    }

    #[test]
    fn list_in_order_with_summary() {
        let conn = conn();
        let sid = session(&conn);
        SegmentRepo::insert(&conn, &segment(&sid, 2)).unwrap();
        SegmentRepo::insert(&conn, &segment(&sid, 1)).unwrap();
        let listed = SegmentRepo::list(&conn, &sid).unwrap();
        assert_eq!(
            listed.iter().map(|s| s.sequence).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(listed[0].summary.topic_flow, vec!["mitosis"]);
        assert_eq!(listed[0].method, CompressionMethod::Fallback);
    }

    #[test]
    fn segments_are_per_session() {
        let conn = conn();
        let a = session(&conn);
        let b = session(&conn);
        SegmentRepo::insert(&conn, &segment(&a, 1)).unwrap();
        assert_eq!(SegmentRepo::next_sequence(&conn, &b).unwrap(), 1);
        assert!(SegmentRepo::list(&conn, &b).unwrap().is_empty());
    }
}

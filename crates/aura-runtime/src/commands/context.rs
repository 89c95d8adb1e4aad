//! Context assembly for command generation.

use aura_core::items::BufferItem;
use aura_core::segments::CompressedSegment;

/// Header separating compressed history from live items.
pub const RECENT_CONTEXT_HEADER: &str = "RECENT CONTEXT:";

/// Compressed history (topics and key concepts per segment) followed by the
/// most recent live items, oldest first.
pub fn assemble_context(segments: &[CompressedSegment], recent: &[BufferItem]) -> String {
    let history: String = segments.iter().map(CompressedSegment::render).collect();
    let live: Vec<String> = recent.iter().map(BufferItem::render).collect();
    format!("{history}\n\n{RECENT_CONTEXT_HEADER}\n{}", live.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_core::ids::SessionId;
    use aura_core::segments::{CompressionMethod, SegmentSummary};
    use chrono::Utc;

    fn segment(sequence: u32, topic: &str) -> CompressedSegment {
        CompressedSegment {
            session_id: SessionId::from("s"),
            sequence,
            time_range: None,
            token_count: 100,
            method: CompressionMethod::Generative,
            summary: SegmentSummary {
                topic_flow: vec![topic.into()],
                ..SegmentSummary::default()
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn history_precedes_recent_items() {
        let segments = [segment(1, "photosynthesis"), segment(2, "respiration")];
        let recent = [
            BufferItem::speech("chlorophyll absorbs light", Utc::now()),
            BufferItem::visual("6CO2 + 6H2O", Utc::now()),
        ];
        let ctx = assemble_context(&segments, &recent);

        let seg1 = ctx.find("--- Segment 1 ---").unwrap();
        let seg2 = ctx.find("--- Segment 2 ---").unwrap();
        let header = ctx.find(RECENT_CONTEXT_HEADER).unwrap();
        assert!(seg1 < seg2 && seg2 < header);
        assert!(ctx.ends_with("chlorophyll absorbs light [Drawing: 6CO2 + 6H2O]"));
    }

    #[test]
    fn empty_session_still_has_header() {
        assert_eq!(assemble_context(&[], &[]), format!("\n\n{RECENT_CONTEXT_HEADER}\n"));
    }
}

//! Compression engine: turns a full buffer into a compressed segment.
//!
//! The engine asks the generation backend for a structured summary of the
//! captured items. Any backend failure (error, timeout, unparseable or empty
//! output) degrades to the deterministic [`fallback_summary`], and the segment
//! is tagged [`CompressionMethod::Fallback`]. Committing the segment goes
//! through an injected [`SegmentSink`], so the engine never touches storage
//! directly.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt::Write as _;

use aura_core::constants::FALLBACK_CONCEPT_MARKER;
use aura_core::ids::SessionId;
use aura_core::items::{BufferItem, ItemKind};
use aura_core::segments::{CompressedSegment, CompressionMethod, SegmentSummary, TimeRange};
use aura_llm::{
    GenerationRequest, ModelTier, ProviderError, ProviderResult, SharedBackend,
    extract_json_object,
};
use aura_settings::ContextSettings;
use aura_store::{AuraStore, NewSegment};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::buffer::ContextBuffer;
use crate::errors::Result;

/// Marker line that opens every compression prompt.
pub const COMPRESSION_TASK: &str = "TASK: compress_context";

const COMPRESSION_TEMPERATURE: f64 = 0.3;

// =============================================================================
// Dependencies trait
// =============================================================================

/// Where committed segments go.
///
/// The commit must assign the next gapless sequence number and record
/// `remaining_tokens` as the session's live estimate in one step.
pub trait SegmentSink: Send + Sync {
    /// Persist `segment` and return it with its assigned sequence number.
    fn commit_segment(
        &self,
        segment: NewSegment,
        remaining_tokens: u64,
    ) -> Result<CompressedSegment>;
}

impl SegmentSink for AuraStore {
    fn commit_segment(
        &self,
        segment: NewSegment,
        remaining_tokens: u64,
    ) -> Result<CompressedSegment> {
        Ok(self.commit_compression(segment, remaining_tokens)?)
    }
}

// =============================================================================
// CompressionEngine
// =============================================================================

/// Summarizes captured buffers into segments.
pub struct CompressionEngine {
    backend: SharedBackend,
    fallback_topic_limit: usize,
}

impl CompressionEngine {
    /// Create an engine over `backend`.
    pub fn new(backend: SharedBackend, settings: &ContextSettings) -> Self {
        Self {
            backend,
            fallback_topic_limit: settings.fallback_topic_limit,
        }
    }

    /// Summarize `items`. Never fails: backend problems yield a fallback.
    pub async fn summarize(&self, items: &[BufferItem]) -> (SegmentSummary, CompressionMethod) {
        if items.is_empty() {
            return (SegmentSummary::default(), CompressionMethod::Fallback);
        }
        match self.generative_summary(items).await {
            Ok(summary) => (summary, CompressionMethod::Generative),
            Err(error) => {
                warn!(
                    backend = self.backend.name(),
                    category = error.category(),
                    error = %error,
                    "generative compression failed, using fallback"
                );
                (
                    fallback_summary(items, self.fallback_topic_limit),
                    CompressionMethod::Fallback,
                )
            }
        }
    }

    async fn generative_summary(&self, items: &[BufferItem]) -> ProviderResult<SegmentSummary> {
        let request = GenerationRequest::new(compression_prompt(items), ModelTier::Fast)
            .with_temperature(COMPRESSION_TEMPERATURE);
        let raw = self.backend.generate(&request).await?;
        let object = extract_json_object(&raw)?;
        let summary: SegmentSummary =
            serde_json::from_value(Value::Object(object)).map_err(|e| ProviderError::Malformed {
                reason: format!("summary shape: {e}"),
            })?;
        if summary.is_empty() {
            return Err(ProviderError::Malformed {
                reason: "summary has no content".into(),
            });
        }
        Ok(summary)
    }

    /// Run one compression cycle for a session whose buffer claimed one.
    ///
    /// Captures the buffer, summarizes without holding the lock, then commits
    /// and releases the captured items under the lock so no append can slip
    /// between the store write and the buffer update. Returns `None` when the
    /// buffer was emptied before capture. On a commit error the buffer is left
    /// intact and the cycle is abandoned.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn run_cycle(
        &self,
        session_id: &SessionId,
        buffer: &Mutex<ContextBuffer>,
        sink: &dyn SegmentSink,
    ) -> Result<Option<CompressedSegment>> {
        let snapshot = buffer.lock().capture();
        if snapshot.is_empty() {
            buffer.lock().abandon_cycle();
            debug!("nothing to compress");
            return Ok(None);
        }

        let (summary, method) = self.summarize(&snapshot.items).await;

        let mut guard = buffer.lock();
        let remaining = guard.remaining_after(&snapshot);
        let draft = NewSegment {
            session_id: session_id.clone(),
            time_range: time_range(&snapshot.items),
            token_count: snapshot.token_estimate,
            method,
            summary,
        };
        match sink.commit_segment(draft, remaining) {
            Ok(segment) => {
                let _ = guard.release(&snapshot);
                info!(
                    sequence = segment.sequence,
                    method = %segment.method,
                    tokens = segment.token_count,
                    remaining,
                    "segment committed"
                );
                Ok(Some(segment))
            }
            Err(error) => {
                guard.abandon_cycle();
                Err(error)
            }
        }
    }
}

// =============================================================================
// Prompt and fallback
// =============================================================================

/// Prompt asking for a structured summary of `items`.
pub fn compression_prompt(items: &[BufferItem]) -> String {
    let mut content = String::new();
    for item in items {
        let label = match item.kind {
            ItemKind::Speech => "SPEECH",
            ItemKind::Visual => "DRAWING",
        };
        let _ = writeln!(
            content,
            "[{}] {label}: {}",
            item.timestamp.format("%H:%M:%S"),
            item.text
        );
    }

    format!(
        "{COMPRESSION_TASK}\n\
         Compress this lecture segment into a structured summary.\n\
         \n\
         CONTENT:\n\
         {content}\n\
         Extract the sequence of topics discussed, key concepts with brief definitions, \
         what was drawn or shown on the board, and dependencies between concepts.\n\
         \n\
         Respond ONLY with valid JSON:\n\
         {{\"topicFlow\": [\"Topic 1\"], \"keyConcepts\": {{\"concept\": \"definition\"}}, \
         \"visualReferences\": [{{\"timestamp\": \"...\", \"content\": \"...\"}}], \
         \"dependencies\": [\"Concept A depends on B\"]}}"
    )
}

/// Deterministic keyword summary used when generation fails.
///
/// Takes the first `limit` distinct whitespace-separated tokens of the speech
/// items in order of first appearance; each becomes a topic and a concept
/// mapped to the placeholder marker. Empty input gives an empty summary.
pub fn fallback_summary(items: &[BufferItem], limit: usize) -> SegmentSummary {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();
    let words = items
        .iter()
        .filter(|i| i.kind == ItemKind::Speech)
        .flat_map(|i| i.text.split_whitespace());
    for word in words {
        if topics.len() >= limit {
            break;
        }
        if seen.insert(word) {
            topics.push(word.to_owned());
        }
    }

    let key_concepts: BTreeMap<String, String> = topics
        .iter()
        .map(|t| (t.clone(), FALLBACK_CONCEPT_MARKER.to_owned()))
        .collect();
    SegmentSummary {
        topic_flow: topics,
        key_concepts,
        ..SegmentSummary::default()
    }
}

fn time_range(items: &[BufferItem]) -> Option<TimeRange> {
    let first = items.first()?;
    let last = items.last()?;
    Some(TimeRange {
        start: first.timestamp,
        end: last.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use aura_llm::{MockBackend, MockReply, TimeoutBackend};
    use aura_store::StoreError;
    use chrono::Utc;
    use serde_json::json;

    use crate::errors::ContextError;

    fn engine(backend: MockBackend) -> CompressionEngine {
        CompressionEngine::new(Arc::new(backend), &ContextSettings::default())
    }

    fn speech(text: &str) -> BufferItem {
        BufferItem::speech(text, Utc::now())
    }

    fn full_buffer(budget: u64) -> Mutex<ContextBuffer> {
        let mut buf = ContextBuffer::new(budget, 1);
        let _ = buf.append(speech(&"m".repeat(budget as usize)));
        Mutex::new(buf)
    }

    struct RejectingSink;

    impl SegmentSink for RejectingSink {
        fn commit_segment(&self, segment: NewSegment, _remaining: u64) -> Result<CompressedSegment> {
            Err(StoreError::SessionNotFound(segment.session_id.to_string()).into())
        }
    }

    #[test]
    fn fallback_takes_first_distinct_speech_words() {
        let items = vec![
            speech("mitosis divides cells"),
            BufferItem::visual("ignored board text", Utc::now()),
            speech("cells divides again mitosis"),
        ];
        let summary = fallback_summary(&items, 4);
        assert_eq!(summary.topic_flow, vec!["mitosis", "divides", "cells", "again"]);
        assert_eq!(summary.key_concepts.len(), 4);
        assert!(summary.key_concepts.values().all(|v| v == FALLBACK_CONCEPT_MARKER));
    }

    #[test]
    fn fallback_of_nothing_is_empty() {
        assert!(fallback_summary(&[], 10).is_empty());
    }

    #[test]
    fn prompt_starts_with_task_marker() {
        let prompt = compression_prompt(&[speech("hello class")]);
        assert!(prompt.starts_with(COMPRESSION_TASK));
        assert!(prompt.contains("SPEECH: hello class"));
    }

    #[tokio::test]
    async fn generative_summary_is_parsed() {
        let reply = json!({
            "topicFlow": ["photosynthesis"],
            "keyConcepts": {"chlorophyll": "green pigment"},
            "visualReferences": [],
            "dependencies": []
        });
        let engine = engine(MockBackend::new().on(COMPRESSION_TASK, MockReply::json(&reply)));
        let (summary, method) = engine.summarize(&[speech("plants make sugar")]).await;
        assert_eq!(method, CompressionMethod::Generative);
        assert_eq!(summary.topic_flow, vec!["photosynthesis"]);
    }

    #[tokio::test]
    async fn fenced_json_is_accepted() {
        let raw = "```json\n{\"topicFlow\": [\"waves\"]}\n```";
        let engine = engine(MockBackend::new().on(COMPRESSION_TASK, MockReply::text(raw)));
        let (summary, method) = engine.summarize(&[speech("sound travels")]).await;
        assert_eq!(method, CompressionMethod::Generative);
        assert_eq!(summary.topic_flow, vec!["waves"]);
    }

    #[tokio::test]
    async fn backend_failure_falls_back() {
        let engine = engine(MockBackend::new().with_default(MockReply::fail("down")));
        let (summary, method) = engine.summarize(&[speech("entropy always grows")]).await;
        assert_eq!(method, CompressionMethod::Fallback);
        assert_eq!(summary.topic_flow, vec!["entropy", "always", "grows"]);
    }

    #[tokio::test]
    async fn empty_object_falls_back() {
        let engine = engine(MockBackend::new().with_default(MockReply::text("{}")));
        let (_, method) = engine.summarize(&[speech("vectors add")]).await;
        assert_eq!(method, CompressionMethod::Fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let slow = MockBackend::new()
            .with_default(MockReply::delayed(Duration::from_secs(60), MockReply::text("{}")));
        let backend = Arc::new(TimeoutBackend::new(Arc::new(slow), Duration::from_secs(1)));
        let engine = CompressionEngine::new(backend, &ContextSettings::default());
        let (_, method) = engine.summarize(&[speech("slow lecture")]).await;
        assert_eq!(method, CompressionMethod::Fallback);
    }

    #[tokio::test]
    async fn cycle_commits_and_resets_buffer() {
        let store = AuraStore::open_in_memory().unwrap();
        let session = store.create_session("Physics", None).unwrap();
        let buffer = full_buffer(20);
        assert!(buffer.lock().claim_if_due());

        let engine = engine(MockBackend::new().with_default(MockReply::fail("down")));
        let segment = engine
            .run_cycle(&session.id, &buffer, &store)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(segment.sequence, 1);
        assert_eq!(segment.method, CompressionMethod::Fallback);
        assert_eq!(segment.token_count, 20);
        assert!(buffer.lock().is_empty());
        assert!(!buffer.lock().compression_in_flight());
        let stored = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(stored.active_buffer_tokens, 0);
    }

    #[tokio::test]
    async fn rejected_commit_keeps_buffer() {
        let buffer = full_buffer(20);
        assert!(buffer.lock().claim_if_due());
        let engine = engine(MockBackend::new().with_default(MockReply::fail("down")));

        let result = engine
            .run_cycle(&SessionId::from("gone"), &buffer, &RejectingSink)
            .await;
        assert_matches!(result, Err(ContextError::Store(StoreError::SessionNotFound(_))));
        let guard = buffer.lock();
        assert_eq!(guard.token_estimate(), 20);
        assert!(!guard.compression_in_flight());
    }

    #[tokio::test]
    async fn cleared_buffer_yields_no_segment() {
        let buffer = Mutex::new(ContextBuffer::new(10, 1));
        let engine = engine(MockBackend::new());
        let result = engine
            .run_cycle(&SessionId::from("s"), &buffer, &RejectingSink)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}

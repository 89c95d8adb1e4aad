//! Orchestrator: the runtime's entry point.
//!
//! Owns the session registry, one ingestion pipeline per live session, the
//! compression engine and the command dispatcher. Every backend handed in is
//! wrapped in the configured generation timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use aura_context::{CompressionEngine, SessionRegistry};
use aura_core::events::{AuraEvent, ReplyTarget};
use aura_core::ids::{CommandId, SessionId, TranscriptId, WhiteboardId};
use aura_core::items::BufferItem;
use aura_core::session::{Session, SessionStatus};
use aura_llm::{SharedBackend, TimeoutBackend};
use aura_settings::AuraSettings;
use aura_store::{AuraStore, Transcript, WhiteboardLog};

use crate::commands::CommandDispatcher;
use crate::emitter::EventEmitter;
use crate::errors::{Result, RuntimeError};
use crate::noise::is_noise;
use crate::pipeline::{IngestReceipt, PipelineDeps, SessionPipeline};

/// One whiteboard capture handed over by the ingestion layer.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualCapture {
    /// Text recognized on the board, possibly empty.
    pub ocr_text: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Opaque canvas state, stored as-is.
    pub snapshot: Value,
    /// Where the rendered image is stored.
    pub image_ref: String,
    /// Board page.
    pub page_number: u32,
}

/// Multi-session coordinator.
pub struct Orchestrator {
    store: Arc<AuraStore>,
    registry: Arc<SessionRegistry>,
    pipelines: DashMap<SessionId, Arc<SessionPipeline>>,
    engine: Arc<CompressionEngine>,
    dispatcher: Arc<CommandDispatcher>,
    emitter: Arc<EventEmitter>,
}

impl Orchestrator {
    /// Build the runtime over `store` and `backend`.
    pub fn new(store: Arc<AuraStore>, backend: SharedBackend, settings: &AuraSettings) -> Self {
        let timeout = Duration::from_millis(settings.generation.timeout_ms);
        let backend: SharedBackend = Arc::new(TimeoutBackend::new(backend, timeout));
        let registry = Arc::new(SessionRegistry::new(
            settings.context.clone(),
            settings.fusion.clone(),
        ));
        let emitter = Arc::new(EventEmitter::new());
        let engine = Arc::new(CompressionEngine::new(
            Arc::clone(&backend),
            &settings.context,
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            backend,
            Arc::clone(&emitter),
            settings,
        ));
        Self {
            store,
            registry,
            pipelines: DashMap::new(),
            engine,
            dispatcher,
            emitter,
        }
    }

    /// The durable store.
    pub fn store(&self) -> &Arc<AuraStore> {
        &self.store
    }

    /// Subscribe to every notification.
    pub fn subscribe(&self) -> broadcast::Receiver<AuraEvent> {
        self.emitter.subscribe()
    }

    /// The notification emitter.
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    /// Sessions with a live pipeline.
    pub fn active_session_count(&self) -> usize {
        self.pipelines.len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create an `active` session.
    pub fn start_session(&self, subject: &str, metadata: Option<&Value>) -> Result<Session> {
        let session = self.store.create_session(subject, metadata)?;
        info!(session_id = %session.id, subject, "session started");
        Ok(session)
    }

    /// Look a session up.
    pub fn session(&self, id: &SessionId) -> Result<Session> {
        self.store
            .get_session(id)?
            .ok_or_else(|| RuntimeError::SessionNotFound(id.to_string()))
    }

    /// Stop accepting input without ending the session.
    pub fn pause_session(&self, id: &SessionId) -> Result<()> {
        self.set_status(id, SessionStatus::Paused)
    }

    /// Accept input again.
    pub fn resume_session(&self, id: &SessionId) -> Result<()> {
        self.set_status(id, SessionStatus::Active)
    }

    fn set_status(&self, id: &SessionId, status: SessionStatus) -> Result<()> {
        if self.store.set_session_status(id, status)? {
            Ok(())
        } else {
            let current = self.session(id)?;
            Err(RuntimeError::SessionInactive {
                session_id: id.to_string(),
                status: current.status,
            })
        }
    }

    /// Mark the session completed and drop its live state.
    pub fn end_session(&self, id: &SessionId) -> Result<Session> {
        let _ = self.store.end_session(id)?;
        self.teardown(id);
        let session = self.session(id)?;
        info!(session_id = %id, "session ended");
        Ok(session)
    }

    /// Delete the session and everything it owns.
    pub fn delete_session(&self, id: &SessionId) -> Result<bool> {
        self.teardown(id);
        Ok(self.store.delete_session(id)?)
    }

    fn teardown(&self, id: &SessionId) {
        let pipeline = self.pipelines.remove(id);
        let context = self.registry.remove(id);
        debug!(
            session_id = %id,
            had_pipeline = pipeline.is_some(),
            had_context = context.is_some(),
            "live state dropped"
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────

    /// Ingest a recognized speech chunk. Noise is dropped and yields `None`.
    #[instrument(skip(self, session_id, text), fields(session_id = %session_id))]
    pub async fn ingest_speech(
        &self,
        session_id: &SessionId,
        text: &str,
        timestamp: DateTime<Utc>,
        confidence: f64,
    ) -> Result<Option<IngestReceipt>> {
        if is_noise(text) {
            debug!(text, "noise filtered");
            return Ok(None);
        }
        let pipeline = self.pipeline_for(session_id)?;
        let transcript = Transcript {
            id: TranscriptId::new(),
            session_id: session_id.clone(),
            text: text.trim().to_owned(),
            timestamp,
            confidence: recognizer_confidence(confidence),
        };
        pipeline.ingest_speech(transcript).await.map(Some)
    }

    /// Ingest a whiteboard capture.
    #[instrument(skip(self, session_id, capture), fields(session_id = %session_id))]
    pub async fn ingest_visual(
        &self,
        session_id: &SessionId,
        capture: VisualCapture,
    ) -> Result<IngestReceipt> {
        let pipeline = self.pipeline_for(session_id)?;
        let log = WhiteboardLog {
            id: WhiteboardId::new(),
            session_id: session_id.clone(),
            snapshot: capture.snapshot,
            image_ref: capture.image_ref,
            ocr_text: capture.ocr_text,
            page_number: capture.page_number,
            timestamp: capture.timestamp,
        };
        pipeline.ingest_visual(log).await
    }

    /// Wait for the session's queued ingestion to finish.
    pub async fn flush(&self, session_id: &SessionId) -> Result<()> {
        let pipeline = self.pipelines.get(session_id).map(|p| Arc::clone(p.value()));
        match pipeline {
            Some(p) => p.flush().await,
            None => Ok(()),
        }
    }

    fn pipeline_for(&self, session_id: &SessionId) -> Result<Arc<SessionPipeline>> {
        let session = self.session(session_id)?;
        if !session.status.accepts_ingestion() {
            return Err(RuntimeError::SessionInactive {
                session_id: session_id.to_string(),
                status: session.status,
            });
        }
        if let Some(existing) = self.pipelines.get(session_id) {
            return Ok(Arc::clone(existing.value()));
        }

        let context = self.registry.get_or_create(session_id)?;
        let entry = self
            .pipelines
            .entry(session_id.clone())
            .or_insert_with(|| {
                Arc::new(SessionPipeline::spawn(PipelineDeps {
                    session_id: session_id.clone(),
                    context,
                    store: Arc::clone(&self.store),
                    engine: Arc::clone(&self.engine),
                    emitter: Arc::clone(&self.emitter),
                }))
            });
        Ok(Arc::clone(entry.value()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Live buffer
    // ─────────────────────────────────────────────────────────────────────

    /// Buffered items of a session, oldest first.
    pub fn buffer_snapshot(&self, session_id: &SessionId) -> Vec<BufferItem> {
        self.registry
            .get(session_id)
            .map(|ctx| ctx.snapshot())
            .unwrap_or_default()
    }

    /// Current token estimate of a session's buffer.
    pub fn token_estimate(&self, session_id: &SessionId) -> u64 {
        self.registry
            .get(session_id)
            .map_or(0, |ctx| ctx.token_estimate())
    }

    /// Empty a session's buffer and zero its persisted estimate.
    pub fn clear_buffer(&self, session_id: &SessionId) -> Result<()> {
        if let Some(ctx) = self.registry.get(session_id) {
            let mut buffer = ctx.buffer().lock();
            buffer.clear();
            self.store.set_buffer_tokens(session_id, 0)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Submit a voice command; the result is delivered to `target`.
    pub fn submit_command(
        &self,
        session_id: &SessionId,
        text: &str,
        timestamp: DateTime<Utc>,
        target: ReplyTarget,
    ) -> Result<CommandId> {
        self.dispatcher.submit(session_id, text, timestamp, target)
    }
}

/// Recognizer confidence bounded to [0, 1]. NaN counts as fully confident,
/// like a chunk that arrives without a score.
fn recognizer_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        warn!("recognizer confidence is NaN, using 1.0");
        return 1.0;
    }
    let bounded = raw.clamp(0.0, 1.0);
    if (bounded - raw).abs() > f64::EPSILON {
        warn!(raw, bounded, "recognizer confidence out of range");
    }
    bounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use aura_llm::MockBackend;

    fn orchestrator() -> Orchestrator {
        let store = Arc::new(AuraStore::open_in_memory().unwrap());
        Orchestrator::new(store, Arc::new(MockBackend::new()), &AuraSettings::default())
    }

    #[tokio::test]
    async fn noise_is_dropped_before_the_pipeline() {
        let orch = orchestrator();
        let s = orch.start_session("Music", None).unwrap();
        let receipt = orch
            .ingest_speech(&s.id, "[Music]", Utc::now(), 0.4)
            .await
            .unwrap();
        assert!(receipt.is_none());
        assert_eq!(orch.active_session_count(), 0);
        assert!(orch.store().list_transcripts(&s.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_bounded_and_speech_still_buffered() {
        let orch = orchestrator();
        let s = orch.start_session("Botany", None).unwrap();
        let start = Utc::now();
        for (n, raw) in [95.0, -0.5, f64::NAN].into_iter().enumerate() {
            let at = start + chrono::Duration::seconds(n as i64);
            let receipt = orch
                .ingest_speech(&s.id, "look at this cell wall", at, raw)
                .await
                .unwrap();
            assert!(receipt.is_some());
        }

        assert_eq!(orch.buffer_snapshot(&s.id).len(), 3);
        let stored: Vec<f64> = orch
            .store()
            .list_transcripts(&s.id)
            .unwrap()
            .iter()
            .map(|t| t.confidence)
            .collect();
        assert_eq!(stored, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn confidence_in_range_is_kept() {
        assert!((recognizer_confidence(0.42) - 0.42).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn paused_session_rejects_input_until_resumed() {
        let orch = orchestrator();
        let s = orch.start_session("Art", None).unwrap();
        orch.pause_session(&s.id).unwrap();
        assert_matches!(
            orch.ingest_speech(&s.id, "brush strokes matter", Utc::now(), 0.9).await,
            Err(RuntimeError::SessionInactive { status: SessionStatus::Paused, .. })
        );

        orch.resume_session(&s.id).unwrap();
        let receipt = orch
            .ingest_speech(&s.id, "brush strokes matter", Utc::now(), 0.9)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.token_estimate, 5);
        assert_eq!(orch.buffer_snapshot(&s.id).len(), 1);
    }

    #[tokio::test]
    async fn end_session_tears_down_live_state() {
        let orch = orchestrator();
        let s = orch.start_session("History", None).unwrap();
        let _ = orch
            .ingest_speech(&s.id, "the empire fell slowly", Utc::now(), 0.9)
            .await
            .unwrap();
        assert_eq!(orch.active_session_count(), 1);

        let ended = orch.end_session(&s.id).unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(ended.end_time.is_some());
        assert_eq!(orch.active_session_count(), 0);
        assert_eq!(orch.token_estimate(&s.id), 0);
        assert_matches!(
            orch.ingest_speech(&s.id, "one more thing", Utc::now(), 0.9).await,
            Err(RuntimeError::SessionInactive { .. })
        );
        assert_matches!(
            orch.resume_session(&s.id),
            Err(RuntimeError::SessionInactive { status: SessionStatus::Completed, .. })
        );
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let orch = orchestrator();
        assert_matches!(
            orch.ingest_speech(&SessionId::from("ghost"), "hello there class", Utc::now(), 0.9)
                .await,
            Err(RuntimeError::SessionNotFound(_))
        );
    }

    #[tokio::test]
    async fn clear_buffer_zeroes_estimate() {
        let orch = orchestrator();
        let s = orch.start_session("Physics", None).unwrap();
        let _ = orch
            .ingest_speech(&s.id, "force equals mass times acceleration", Utc::now(), 0.9)
            .await
            .unwrap();
        assert!(orch.token_estimate(&s.id) > 0);

        orch.clear_buffer(&s.id).unwrap();
        orch.clear_buffer(&s.id).unwrap();
        assert_eq!(orch.token_estimate(&s.id), 0);
        assert_eq!(orch.session(&s.id).unwrap().active_buffer_tokens, 0);
    }
}

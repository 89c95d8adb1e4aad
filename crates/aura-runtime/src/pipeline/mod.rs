//! Per-session ingestion pipeline.
//!
//! Every ingested speech or visual chunk of a session goes through one MPSC
//! queue drained by a single worker task, so appends, fusion and token
//! bookkeeping for that session apply in arrival order and never interleave.
//! Compression runs in its own task (see [`compression`]) so ingestion keeps
//! flowing while a cycle waits on the backend.

pub mod compression;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use aura_context::{CompressionEngine, FusionMatch, SessionContext, SpeechEvent, VisualEvent};
use aura_core::events::{AuraEvent, EventPayload};
use aura_core::fusion::FusionLink;
use aura_core::ids::SessionId;
use aura_core::items::BufferItem;
use aura_store::{AuraStore, Transcript, WhiteboardLog};

use crate::emitter::EventEmitter;
use crate::errors::{Result, RuntimeError};

/// Queued requests per session before senders wait.
const QUEUE_CAPACITY: usize = 256;

/// What a pipeline needs to process one session.
pub struct PipelineDeps {
    /// Session served.
    pub session_id: SessionId,
    /// Its live buffer and fusion windows.
    pub context: Arc<SessionContext>,
    /// Durable store.
    pub store: Arc<AuraStore>,
    /// Shared compression engine.
    pub engine: Arc<CompressionEngine>,
    /// Notification channel.
    pub emitter: Arc<EventEmitter>,
}

impl PipelineDeps {
    fn notify(&self, payload: EventPayload) {
        let _ = self
            .emitter
            .emit(AuraEvent::to_session(self.session_id.clone(), payload));
    }
}

/// Outcome of one ingested chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct IngestReceipt {
    /// Buffer token estimate after the chunk.
    pub token_estimate: u64,
    /// Link created by the chunk, if any.
    pub fusion_link: Option<FusionLink>,
    /// Whether the chunk started a compression cycle.
    pub compression_scheduled: bool,
}

enum PipelineRequest {
    Speech {
        transcript: Transcript,
        reply: oneshot::Sender<Result<IngestReceipt>>,
    },
    Visual {
        log: WhiteboardLog,
        reply: oneshot::Sender<Result<IngestReceipt>>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to one session's ingestion worker. Dropping it stops the worker
/// once the queue drains.
pub struct SessionPipeline {
    tx: mpsc::Sender<PipelineRequest>,
    worker_handle: JoinHandle<()>,
}

impl SessionPipeline {
    /// Spawn the worker.
    pub fn spawn(deps: PipelineDeps) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker_handle = tokio::spawn(pipeline_worker(rx, Arc::new(deps)));
        Self { tx, worker_handle }
    }

    /// Persist, correlate and buffer a transcript.
    pub async fn ingest_speech(&self, transcript: Transcript) -> Result<IngestReceipt> {
        self.request(|reply| PipelineRequest::Speech { transcript, reply })
            .await
    }

    /// Persist, correlate and buffer a whiteboard capture.
    pub async fn ingest_visual(&self, log: WhiteboardLog) -> Result<IngestReceipt> {
        self.request(|reply| PipelineRequest::Visual { log, reply }).await
    }

    /// Wait until everything queued before this call is processed.
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PipelineRequest::Flush { reply: reply_tx })
            .await
            .map_err(|_| self.closed())?;
        reply_rx
            .await
            .map_err(|_| RuntimeError::Pipeline("Flush reply dropped".into()))
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<IngestReceipt>>) -> PipelineRequest,
    ) -> Result<IngestReceipt> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| self.closed())?;
        reply_rx
            .await
            .map_err(|_| RuntimeError::Pipeline("Ingest reply dropped".into()))?
    }

    fn closed(&self) -> RuntimeError {
        if self.worker_handle.is_finished() {
            RuntimeError::Pipeline("Pipeline worker panicked or exited".into())
        } else {
            RuntimeError::Pipeline("Pipeline channel closed".into())
        }
    }
}

async fn pipeline_worker(mut rx: mpsc::Receiver<PipelineRequest>, deps: Arc<PipelineDeps>) {
    while let Some(req) = rx.recv().await {
        match req {
            PipelineRequest::Speech { transcript, reply } => {
                let result = handle_speech(&deps, transcript);
                log_failure(&deps, "speech", &result);
                let _ = reply.send(result);
            }
            PipelineRequest::Visual { log, reply } => {
                let result = handle_visual(&deps, log);
                log_failure(&deps, "visual", &result);
                let _ = reply.send(result);
            }
            PipelineRequest::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }
    debug!(session_id = %deps.session_id, "pipeline worker stopped");
}

fn log_failure(deps: &PipelineDeps, kind: &str, result: &Result<IngestReceipt>) {
    if let Err(e) = result {
        warn!(
            session_id = %deps.session_id,
            kind,
            category = e.category(),
            error = %e,
            "ingest abandoned"
        );
    }
}

fn handle_speech(deps: &Arc<PipelineDeps>, transcript: Transcript) -> Result<IngestReceipt> {
    deps.store.insert_transcript(&transcript)?;

    let matched = deps.context.fusion().lock().on_speech(SpeechEvent {
        id: transcript.id.clone(),
        text: transcript.text.clone(),
        timestamp: transcript.timestamp,
    });
    let fusion_link = matched.and_then(|m| persist_link(deps, m));

    let (token_estimate, compression_scheduled) =
        append(deps, BufferItem::speech(transcript.text, transcript.timestamp));
    Ok(IngestReceipt {
        token_estimate,
        fusion_link,
        compression_scheduled,
    })
}

fn handle_visual(deps: &Arc<PipelineDeps>, log: WhiteboardLog) -> Result<IngestReceipt> {
    deps.store.insert_whiteboard(&log)?;

    deps.context.fusion().lock().on_visual(VisualEvent {
        id: log.id.clone(),
        text: log.ocr_text.clone(),
        timestamp: log.timestamp,
    });

    let text = log.ocr_text.trim();
    if text.is_empty() {
        return Ok(IngestReceipt {
            token_estimate: deps.context.token_estimate(),
            fusion_link: None,
            compression_scheduled: false,
        });
    }
    let (token_estimate, compression_scheduled) =
        append(deps, BufferItem::visual(text, log.timestamp));
    Ok(IngestReceipt {
        token_estimate,
        fusion_link: None,
        compression_scheduled,
    })
}

fn persist_link(deps: &PipelineDeps, matched: FusionMatch) -> Option<FusionLink> {
    let link = matched.into_link(deps.session_id.clone());
    match deps.store.insert_fusion_link(&link) {
        Ok(()) => {
            debug!(
                session_id = %deps.session_id,
                transcript_id = %link.transcript_id,
                whiteboard_id = %link.whiteboard_id,
                confidence = link.confidence.value(),
                "fusion link recorded"
            );
            Some(link)
        }
        Err(e) => {
            warn!(session_id = %deps.session_id, error = %e, "fusion link dropped");
            None
        }
    }
}

/// Append under the buffer lock, mirroring the estimate to the store, and
/// start a compression cycle if this append claimed one.
fn append(deps: &Arc<PipelineDeps>, item: BufferItem) -> (u64, bool) {
    let outcome = {
        let mut buffer = deps.context.buffer().lock();
        let outcome = buffer.append(item);
        if let Err(e) = deps
            .store
            .set_buffer_tokens(&deps.session_id, outcome.token_estimate)
        {
            warn!(session_id = %deps.session_id, error = %e, "buffer tokens not persisted");
        }
        outcome
    };
    if outcome.compression_due {
        compression::spawn_cycle(Arc::clone(deps));
    }
    (outcome.token_estimate, outcome.compression_due)
}

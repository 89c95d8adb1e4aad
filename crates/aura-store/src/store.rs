//! High-level transactional [`AuraStore`] API.
//!
//! Composes repository calls into the units of work the pipeline needs.
//! Multi-row writes run inside a single transaction, so readers never see a
//! segment without its buffer-token reset, or a quiz without its completed
//! command.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use aura_core::commands::{Command, Intent, Quiz};
use aura_core::fusion::FusionLink;
use aura_core::ids::{CommandId, SessionId};
use aura_core::segments::{CompressedSegment, CompressionMethod, SegmentSummary, TimeRange};
use aura_core::session::{Session, SessionStatus};

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::command::CommandRepo;
use crate::sqlite::repositories::fusion::FusionRepo;
use crate::sqlite::repositories::quiz::QuizRepo;
use crate::sqlite::repositories::segment::SegmentRepo;
use crate::sqlite::repositories::session::SessionRepo;
use crate::sqlite::repositories::transcript::{Transcript, TranscriptRepo};
use crate::sqlite::repositories::whiteboard::{WhiteboardLog, WhiteboardRepo};

/// A segment about to be written; the store assigns its sequence number.
#[derive(Clone, Debug)]
pub struct NewSegment {
    /// Owning session.
    pub session_id: SessionId,
    /// Span of the compressed items.
    pub time_range: Option<TimeRange>,
    /// Token estimate of the compressed items.
    pub token_count: u64,
    /// Generative or fallback.
    pub method: CompressionMethod,
    /// The summary.
    pub summary: SegmentSummary,
}

/// Store facade over a connection pool.
pub struct AuraStore {
    pool: ConnectionPool,
}

impl AuraStore {
    /// Wrap an existing pool. Migrations must already have run.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and migrate it.
    pub fn open(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::new_file(path, config)?;
        let _ = run_migrations(&*pool.get()?)?;
        Ok(Self::new(pool))
    }

    /// In-memory database, migrated. Used by tests and demos.
    pub fn open_in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        let _ = run_migrations(&*pool.get()?)?;
        Ok(Self::new(pool))
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Create an `active` session.
    pub fn create_session(
        &self,
        subject: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<Session> {
        SessionRepo::create(&*self.conn()?, subject, metadata)
    }

    /// Get a session.
    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        SessionRepo::get(&*self.conn()?, id)
    }

    /// Get a session or fail with [`StoreError::SessionNotFound`].
    pub fn require_session(&self, id: &SessionId) -> Result<Session> {
        self.get_session(id)?
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    /// List sessions, optionally by status.
    pub fn list_sessions(&self, status: Option<SessionStatus>) -> Result<Vec<Session>> {
        SessionRepo::list(&*self.conn()?, status)
    }

    /// Pause or resume. Completed sessions cannot change status.
    pub fn set_session_status(&self, id: &SessionId, status: SessionStatus) -> Result<bool> {
        SessionRepo::set_status(&*self.conn()?, id, status)
    }

    /// Mark completed with an end time.
    pub fn end_session(&self, id: &SessionId) -> Result<bool> {
        SessionRepo::mark_completed(&*self.conn()?, id)
    }

    /// Delete a session and everything it owns.
    pub fn delete_session(&self, id: &SessionId) -> Result<bool> {
        let deleted = SessionRepo::delete(&*self.conn()?, id)?;
        debug!(session_id = %id, deleted, "session delete");
        Ok(deleted)
    }

    /// Persist the live buffer's token estimate.
    pub fn set_buffer_tokens(&self, id: &SessionId, tokens: u64) -> Result<()> {
        if SessionRepo::set_buffer_tokens(&*self.conn()?, id, tokens)? {
            Ok(())
        } else {
            Err(StoreError::SessionNotFound(id.to_string()))
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Segments
    // ─────────────────────────────────────────────────────────────────────

    /// Append a segment with the next sequence number and record the
    /// remaining buffer token estimate, atomically.
    pub fn commit_compression(
        &self,
        segment: NewSegment,
        remaining_tokens: u64,
    ) -> Result<CompressedSegment> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        if !SessionRepo::exists(&tx, &segment.session_id)? {
            return Err(StoreError::SessionNotFound(segment.session_id.to_string()));
        }
        let sequence = SegmentRepo::next_sequence(&tx, &segment.session_id)?;
        let committed = CompressedSegment {
            session_id: segment.session_id,
            sequence,
            time_range: segment.time_range,
            token_count: segment.token_count,
            method: segment.method,
            summary: segment.summary,
            created_at: Utc::now(),
        };
        SegmentRepo::insert(&tx, &committed)?;
        let _ = SessionRepo::set_buffer_tokens(&tx, &committed.session_id, remaining_tokens)?;

        tx.commit()?;
        Ok(committed)
    }

    /// All segments of a session in sequence order.
    pub fn list_segments(&self, session_id: &SessionId) -> Result<Vec<CompressedSegment>> {
        SegmentRepo::list(&*self.conn()?, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Raw inputs and links
    // ─────────────────────────────────────────────────────────────────────

    /// Persist a transcript.
    pub fn insert_transcript(&self, transcript: &Transcript) -> Result<()> {
        TranscriptRepo::insert(&*self.conn()?, transcript)
    }

    /// Transcripts of a session.
    pub fn list_transcripts(&self, session_id: &SessionId) -> Result<Vec<Transcript>> {
        TranscriptRepo::list(&*self.conn()?, session_id)
    }

    /// Persist a whiteboard snapshot.
    pub fn insert_whiteboard(&self, log: &WhiteboardLog) -> Result<()> {
        WhiteboardRepo::insert(&*self.conn()?, log)
    }

    /// Whiteboard snapshots of a session.
    pub fn list_whiteboards(&self, session_id: &SessionId) -> Result<Vec<WhiteboardLog>> {
        WhiteboardRepo::list(&*self.conn()?, session_id)
    }

    /// Persist a fusion link.
    pub fn insert_fusion_link(&self, link: &FusionLink) -> Result<()> {
        FusionRepo::insert(&*self.conn()?, link)
    }

    /// Fusion links of a session.
    pub fn list_fusion_links(&self, session_id: &SessionId) -> Result<Vec<FusionLink>> {
        FusionRepo::list(&*self.conn()?, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands and quizzes
    // ─────────────────────────────────────────────────────────────────────

    /// Record a `pending` command.
    pub fn create_command(
        &self,
        session_id: &SessionId,
        raw_text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Command> {
        CommandRepo::insert_pending(&*self.conn()?, session_id, raw_text, timestamp)
    }

    /// Get a command.
    pub fn get_command(&self, id: &CommandId) -> Result<Option<Command>> {
        CommandRepo::get(&*self.conn()?, id)
    }

    /// Commands of a session.
    pub fn list_commands(&self, session_id: &SessionId) -> Result<Vec<Command>> {
        CommandRepo::list(&*self.conn()?, session_id)
    }

    /// `pending -> processing`.
    pub fn mark_command_processing(&self, id: &CommandId, intent: Intent) -> Result<()> {
        CommandRepo::mark_processing(&*self.conn()?, id, intent)
    }

    /// `processing -> completed`, inserting `quiz` in the same transaction.
    pub fn complete_command(
        &self,
        id: &CommandId,
        response: &serde_json::Value,
        processing_time_ms: u64,
        quiz: Option<&Quiz>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        if let Some(quiz) = quiz {
            QuizRepo::insert(&tx, quiz)?;
        }
        CommandRepo::mark_completed(&tx, id, response, processing_time_ms)?;
        tx.commit()?;
        Ok(())
    }

    /// `pending | processing -> failed`.
    pub fn fail_command(&self, id: &CommandId, message: &str, processing_time_ms: u64) -> Result<()> {
        CommandRepo::mark_failed(&*self.conn()?, id, message, processing_time_ms)
    }

    /// Look a quiz up by share code.
    pub fn quiz_by_share_code(&self, share_code: &str) -> Result<Option<Quiz>> {
        QuizRepo::get_by_share_code(&*self.conn()?, share_code)
    }

    /// Quizzes of a session.
    pub fn list_quizzes(&self, session_id: &SessionId) -> Result<Vec<Quiz>> {
        QuizRepo::list(&*self.conn()?, session_id)
    }
}

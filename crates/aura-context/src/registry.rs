//! Live session contexts.
//!
//! Each active session owns one [`SessionContext`]: its buffer and its
//! fusion windows, each behind its own lock. Contexts are created lazily on
//! first use and dropped when the session ends.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use aura_core::ids::SessionId;
use aura_core::items::BufferItem;
use aura_settings::{ContextSettings, FusionSettings};

use crate::buffer::{AppendOutcome, ContextBuffer};
use crate::errors::Result;
use crate::fusion::FusionCorrelator;

/// One session's in-memory working state.
#[derive(Debug)]
pub struct SessionContext {
    session_id: SessionId,
    buffer: Mutex<ContextBuffer>,
    fusion: Mutex<FusionCorrelator>,
}

impl SessionContext {
    /// Fresh context for `session_id`.
    pub fn new(
        session_id: SessionId,
        context: &ContextSettings,
        fusion: &FusionSettings,
    ) -> Result<Self> {
        Ok(Self {
            session_id,
            buffer: Mutex::new(ContextBuffer::from_settings(context)),
            fusion: Mutex::new(FusionCorrelator::new(fusion)?),
        })
    }

    /// Owning session.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The buffer lock. Never hold it across an `.await`.
    pub fn buffer(&self) -> &Mutex<ContextBuffer> {
        &self.buffer
    }

    /// The fusion windows lock.
    pub fn fusion(&self) -> &Mutex<FusionCorrelator> {
        &self.fusion
    }

    /// Append to the buffer.
    pub fn append(&self, item: BufferItem) -> AppendOutcome {
        self.buffer.lock().append(item)
    }

    /// Copy of every buffered item, oldest first.
    pub fn snapshot(&self) -> Vec<BufferItem> {
        self.buffer.lock().items().to_vec()
    }

    /// The newest `limit` items, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<BufferItem> {
        self.buffer.lock().recent(limit)
    }

    /// Current token estimate.
    pub fn token_estimate(&self) -> u64 {
        self.buffer.lock().token_estimate()
    }

    /// Empty the buffer.
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

/// Concurrent map of live contexts.
pub struct SessionRegistry {
    contexts: DashMap<SessionId, Arc<SessionContext>>,
    context_settings: ContextSettings,
    fusion_settings: FusionSettings,
}

impl SessionRegistry {
    /// Empty registry; new contexts use these settings.
    pub fn new(context_settings: ContextSettings, fusion_settings: FusionSettings) -> Self {
        Self {
            contexts: DashMap::new(),
            context_settings,
            fusion_settings,
        }
    }

    /// Context for `id`, created if absent.
    pub fn get_or_create(&self, id: &SessionId) -> Result<Arc<SessionContext>> {
        if let Some(existing) = self.get(id) {
            return Ok(existing);
        }
        let created = Arc::new(SessionContext::new(
            id.clone(),
            &self.context_settings,
            &self.fusion_settings,
        )?);
        let entry = self.contexts.entry(id.clone()).or_insert(created);
        debug!(session_id = %id, "session context ready");
        Ok(Arc::clone(&*entry))
    }

    /// Context for `id`, if live.
    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionContext>> {
        self.contexts.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the context for `id`.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<SessionContext>> {
        self.contexts.remove(id).map(|(_, ctx)| ctx)
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no context is live.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Settings new contexts are built with.
    pub fn context_settings(&self) -> &ContextSettings {
        &self.context_settings
    }
}

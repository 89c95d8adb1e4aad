//! Runtime error types.

use aura_context::ContextError;
use aura_core::session::SessionStatus;
use aura_llm::ProviderError;
use aura_store::StoreError;

/// Errors surfaced by session pipelines and command dispatch.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Generation backend failure, including timeouts.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Durable store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Live context failure.
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    /// Session does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session exists but does not accept input.
    #[error("Session {session_id} is {status}")]
    SessionInactive {
        /// Session ID.
        session_id: String,
        /// Its current status.
        status: SessionStatus,
    },

    /// Generated payload does not have the expected shape.
    #[error("Invalid {intent} payload: {reason}")]
    InvalidPayload {
        /// Intent whose payload was rejected.
        intent: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// Every minted share code collided.
    #[error("No free share code after {0} attempts")]
    ShareCodeExhausted(u32),

    /// The session pipeline worker is gone.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl RuntimeError {
    /// Whether the caller can retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            Self::ShareCodeExhausted(_) => true,
            Self::Context(_)
            | Self::SessionNotFound(_)
            | Self::SessionInactive { .. }
            | Self::InvalidPayload { .. }
            | Self::Pipeline(_) => false,
        }
    }

    /// Error category string for logs and notifications.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::Store(_) => "store",
            Self::Context(_) => "context",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionInactive { .. } => "session_inactive",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::ShareCodeExhausted(_) => "share_code",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_recoverable_provider_error() {
        let err = RuntimeError::from(ProviderError::Timeout { timeout_ms: 30_000 });
        assert_eq!(err.category(), "provider");
        assert!(err.is_recoverable());
    }

    #[test]
    fn inactive_session_message() {
        let err = RuntimeError::SessionInactive {
            session_id: "s1".into(),
            status: SessionStatus::Paused,
        };
        assert_eq!(err.to_string(), "Session s1 is paused");
        assert!(!err.is_recoverable());
    }
}

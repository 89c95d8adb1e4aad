//! Context error types.

use aura_core::errors::CoreError;
use aura_store::StoreError;

/// Errors from committing compression results.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The sink rejected the segment.
    #[error("segment commit failed: {0}")]
    Store(#[from] StoreError),

    /// Settings produced an invalid value.
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] CoreError),
}

impl ContextError {
    /// Short machine-readable category.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Store(e) => e.category(),
            Self::InvalidSettings(_) => "settings",
        }
    }
}

/// Result alias for context operations.
pub type Result<T> = std::result::Result<T, ContextError>;

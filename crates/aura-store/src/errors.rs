//! Error types for the store.
//!
//! [`StoreError`] is returned by every store operation. Pipelines treat it
//! as a data-integrity failure: the unit of work is logged and abandoned.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Requested session was not found.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Requested command was not found.
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// A command was not in the status the transition requires.
    #[error("command {command_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Command whose transition was refused.
        command_id: String,
        /// Status found in the store.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A quiz share code collided with an existing one.
    #[error("share code already in use: {0}")]
    ShareCodeTaken(String),

    /// A write would break a cross-row invariant.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// A stored value could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Short machine-readable category.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Pool(_) => "pool",
            Self::Serde(_) => "serde",
            Self::Migration { .. } => "migration",
            Self::SessionNotFound(_) | Self::CommandNotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ShareCodeTaken(_) => "conflict",
            Self::Integrity(_) => "integrity",
            Self::Corrupt(_) => "corrupt",
        }
    }

    /// Whether retrying the same call could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Pool(_) | Self::ShareCodeTaken(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_display() {
        let err = StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
        assert_eq!(err.category(), "sqlite");
        assert!(!err.is_retryable());
    }

    #[test]
    fn session_not_found_display() {
        let err = StoreError::SessionNotFound("sess-123".into());
        assert_eq!(err.to_string(), "session not found: sess-123");
        assert_eq!(err.category(), "not_found");
    }

    #[test]
    fn share_code_conflict_is_retryable() {
        let err = StoreError::ShareCodeTaken("ABCD1234".into());
        assert!(err.is_retryable());
        assert_eq!(err.category(), "conflict");
    }

    #[test]
    fn transition_display() {
        let err = StoreError::InvalidTransition {
            command_id: "cmd-1".into(),
            from: "pending".into(),
            to: "completed".into(),
        };
        assert_eq!(
            err.to_string(),
            "command cmd-1 cannot move from pending to completed"
        );
        assert!(err.to_string().contains("completed"));
    }
}

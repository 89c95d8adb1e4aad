//! Errors raised by the foundation types themselves.

use thiserror::Error;

/// Failure to interpret or validate a core value.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// A stored or wire string did not name a known variant.
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant {
        /// The enum being parsed (e.g. "intent").
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A command status change that the lifecycle does not allow.
    #[error("invalid command transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A fusion confidence outside `[0, 1]`.
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_display() {
        let err = CoreError::UnknownVariant {
            kind: "intent",
            value: "dance".into(),
        };
        assert_eq!(err.to_string(), "unknown intent: \"dance\"");
    }

    #[test]
    fn transition_display() {
        let err = CoreError::InvalidTransition {
            from: "completed".into(),
            to: "processing".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid command transition: completed -> processing"
        );
    }
}

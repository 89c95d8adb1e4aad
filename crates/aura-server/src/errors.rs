//! Server error types and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use aura_runtime::RuntimeError;
use aura_store::StoreError;

/// Errors raised by the delivery layer.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Orchestrator failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Direct store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Connection limit reached.
    #[error("Connection limit of {0} reached")]
    TooManyConnections(usize),
}

impl ServerError {
    /// Error category string for logs and response bodies.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "bind",
            Self::Runtime(e) => e.category(),
            Self::Store(_) => "store",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::TooManyConnections(_) => "too_many_connections",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_)
            | Self::Runtime(RuntimeError::SessionNotFound(_))
            | Self::Store(StoreError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Runtime(RuntimeError::SessionInactive { .. }) => StatusCode::CONFLICT,
            Self::BadRequest(_) | Self::Runtime(RuntimeError::InvalidPayload { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::TooManyConnections(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Bind { .. } | Self::Runtime(_) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(category = self.category(), error = %self, "request failed");
        }
        let body = json!({
            "error": {
                "code": self.category(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Convenience alias for server results.
pub type Result<T> = std::result::Result<T, ServerError>;

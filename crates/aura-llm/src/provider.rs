//! The [`GenerationBackend`] trait and its error type.
//!
//! A backend turns one prompt into one text response. Everything above it
//! (intent classification, compression, content strategies) is prompt
//! construction plus parsing of that text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a generation backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed (missing or rejected key).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The call did not finish within its deadline.
    #[error("generation timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// The response was not in the expected shape.
    #[error("malformed response: {reason}")]
    Malformed {
        /// What was wrong with it.
        reason: String,
    },

    /// No backend is configured.
    #[error("generation backend not configured: {message}")]
    NotConfigured {
        /// Why.
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Json(_)
            | Self::Auth { .. }
            | Self::Malformed { .. }
            | Self::NotConfigured { .. }
            | Self::Other { .. } => false,
        }
    }

    /// Error category string.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::Malformed { .. } => "parse",
            Self::Auth { .. } | Self::NotConfigured { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Timeout { .. } => "timeout",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Result alias for backend calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Model tier: cheap and quick, or capable and slower.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Classification and compression.
    #[default]
    Fast,
    /// Content generation.
    Smart,
}

/// One generation call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Full prompt text.
    pub prompt: String,
    /// Which model tier to use.
    pub tier: ModelTier,
    /// Sampling temperature override.
    pub temperature: Option<f64>,
}

impl GenerationRequest {
    /// Request at the given tier with the backend's default temperature.
    #[must_use]
    pub fn new(prompt: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            prompt: prompt.into(),
            tier,
            temperature: None,
        }
    }

    /// Override the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A text generation backend.
///
/// Implementors must be `Send + Sync`; one instance is shared by every
/// session pipeline and command task.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &str;

    /// Produce a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String>;
}

/// Shared backend handle.
pub type SharedBackend = Arc<dyn GenerationBackend>;

/// Backend used when no credentials are available. Every call fails, so
/// compression falls back and commands fail with a clear reason.
#[derive(Clone, Debug)]
pub struct UnconfiguredBackend {
    reason: String,
}

impl UnconfiguredBackend {
    /// Backend that fails every call with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl GenerationBackend for UnconfiguredBackend {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _request: &GenerationRequest) -> ProviderResult<String> {
        Err(ProviderError::NotConfigured {
            message: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn timeout_is_retryable() {
        let err = ProviderError::Timeout { timeout_ms: 30_000 };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "timeout");
        assert_eq!(err.to_string(), "generation timed out after 30000ms");
    }

    #[test]
    fn malformed_is_not_retryable() {
        let err = ProviderError::Malformed {
            reason: "expected object".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "parse");
    }

    #[test]
    fn api_error_retryable_flag() {
        let err = ProviderError::Api {
            status: 503,
            message: "overloaded".into(),
            retryable: true,
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "api");
    }

    #[test]
    fn request_builder() {
        let req = GenerationRequest::new("hi", ModelTier::Smart).with_temperature(0.2);
        assert_eq!(req.tier, ModelTier::Smart);
        assert_eq!(req.temperature, Some(0.2));
    }

    #[tokio::test]
    async fn unconfigured_backend_always_fails() {
        let backend = UnconfiguredBackend::new("AURA_API_KEY is not set");
        let result = backend.generate(&GenerationRequest::new("x", ModelTier::Fast)).await;
        assert_matches!(result, Err(ProviderError::NotConfigured { message }) if message.contains("AURA_API_KEY"));
    }
}

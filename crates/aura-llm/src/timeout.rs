//! Deadline enforcement for backend calls.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::provider::{
    GenerationBackend, GenerationRequest, ProviderError, ProviderResult, SharedBackend,
};

/// Wraps a backend so that every call either finishes within `timeout` or
/// fails with [`ProviderError::Timeout`].
pub struct TimeoutBackend {
    inner: SharedBackend,
    timeout: Duration,
}

impl TimeoutBackend {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: SharedBackend, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The enforced deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl GenerationBackend for TimeoutBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        if let Ok(result) = tokio::time::timeout(self.timeout, self.inner.generate(request)).await {
            result
        } else {
            let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(backend = self.inner.name(), timeout_ms, "generation call timed out");
            Err(ProviderError::Timeout { timeout_ms })
        }
    }
}

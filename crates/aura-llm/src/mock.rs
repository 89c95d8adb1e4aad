//! Scripted backend for tests and local demos.
//!
//! Replies are chosen by substring match on the prompt, first rule wins, so
//! concurrent callers get deterministic answers regardless of call order.
//!
//! ```ignore
//! let backend = MockBackend::new()
//!     .on("TASK: classify_intent", MockReply::text("generate_quiz"))
//!     .on("TASK: summarize", MockReply::delayed(Duration::from_secs(60), MockReply::text("{}")))
//!     .with_default(MockReply::fail("unexpected prompt"));
//! ```

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::provider::{GenerationBackend, GenerationRequest, ProviderError, ProviderResult};

/// A scripted reply.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Succeed with this text.
    Text(String),
    /// Fail with [`ProviderError::Other`].
    Fail(String),
    /// Wait, then produce the inner reply.
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    /// Successful reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Successful reply carrying `value` serialized as JSON.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::Text(value.to_string())
    }

    /// Failing reply.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    /// Reply after `delay`.
    pub fn delayed(delay: Duration, then: MockReply) -> Self {
        Self::Delayed(delay, Box::new(then))
    }
}

/// Rule-based mock backend.
pub struct MockBackend {
    rules: Vec<(String, MockReply)>,
    default: MockReply,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Backend with no rules; unmatched prompts fail.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: MockReply::fail("no scripted reply for prompt"),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` to prompts containing `needle`.
    #[must_use]
    pub fn on(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    /// Reply for prompts no rule matches.
    #[must_use]
    pub fn with_default(mut self, reply: MockReply) -> Self {
        self.default = reply;
        self
    }

    /// Every request seen so far, in arrival order.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of requests whose prompt contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.prompt.contains(needle))
            .count()
    }

    fn select(&self, prompt: &str) -> MockReply {
        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map_or_else(|| self.default.clone(), |(_, reply)| reply.clone())
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        self.calls.lock().push(request.clone());
        let mut reply = self.select(&request.prompt);
        loop {
            match reply {
                MockReply::Text(text) => return Ok(text),
                MockReply::Fail(message) => return Err(ProviderError::Other { message }),
                MockReply::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ModelTier;
    use assert_matches::assert_matches;

    fn req(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(prompt, ModelTier::Fast)
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let backend = MockBackend::new()
            .on("quiz", MockReply::text("A"))
            .on("quiz me", MockReply::text("B"));
        assert_eq!(backend.generate(&req("please quiz me")).await.unwrap(), "A");
    }

    #[tokio::test]
    async fn unmatched_uses_default() {
        let backend = MockBackend::new();
        assert_matches!(
            backend.generate(&req("hello")).await,
            Err(ProviderError::Other { .. })
        );
        let backend = MockBackend::new().with_default(MockReply::text("fallback"));
        assert_eq!(backend.generate(&req("hello")).await.unwrap(), "fallback");
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_reply_waits() {
        let backend = MockBackend::new().with_default(MockReply::delayed(
            Duration::from_secs(5),
            MockReply::text("done"),
        ));
        let start = tokio::time::Instant::now();
        assert_eq!(backend.generate(&req("x")).await.unwrap(), "done");
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn records_calls() {
        let backend = MockBackend::new().with_default(MockReply::text("ok"));
        let _ = backend.generate(&req("one")).await;
        let _ = backend.generate(&req("two")).await;
        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.calls_matching("tw"), 1);
        assert_eq!(backend.calls()[0].prompt, "one");
    }
}

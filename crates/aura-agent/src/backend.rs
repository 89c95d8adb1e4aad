//! Generation backend selection.

use std::sync::Arc;

use aura_llm::{
    MockBackend, MockReply, OpenAiCompatibleBackend, OpenAiCompatibleConfig, SharedBackend,
    UnconfiguredBackend,
};
use aura_context::COMPRESSION_TASK;
use aura_runtime::commands::CLASSIFY_TASK;
use aura_settings::{GenerationSettings, ProviderKind};
use serde_json::json;
use tracing::{info, warn};

/// Pick the backend for `generation`.
///
/// `force_mock` (or `provider = mock`) selects the scripted demo backend.
/// Otherwise the API key is read from the configured environment variable;
/// without one every call fails and the pipeline runs on fallbacks.
pub fn select_backend(generation: &GenerationSettings, force_mock: bool) -> SharedBackend {
    if force_mock || generation.provider == ProviderKind::Mock {
        info!("using scripted demo backend");
        return Arc::new(demo_backend());
    }

    let key = std::env::var(&generation.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty());
    let Some(key) = key else {
        warn!(
            env = %generation.api_key_env,
            "API key not set, compression will use fallbacks and commands will fail"
        );
        return Arc::new(UnconfiguredBackend::new(format!(
            "{} is not set",
            generation.api_key_env
        )));
    };

    match OpenAiCompatibleBackend::new(OpenAiCompatibleConfig::from_settings(generation, key)) {
        Ok(backend) => {
            info!(
                base_url = %generation.base_url,
                fast_model = %generation.fast_model,
                smart_model = %generation.smart_model,
                "using OpenAI-compatible backend"
            );
            Arc::new(backend)
        }
        Err(e) => {
            warn!(error = %e, "failed to build HTTP backend");
            Arc::new(UnconfiguredBackend::new(e.to_string()))
        }
    }
}

/// Scripted backend for running the server without credentials.
/// Every command is treated as a request for an explanation.
pub fn demo_backend() -> MockBackend {
    MockBackend::new()
        .on(CLASSIFY_TASK, MockReply::text("explain"))
        .on(
            COMPRESSION_TASK,
            MockReply::json(&json!({
                "topicFlow": ["demo lecture"],
                "keyConcepts": {"demo lecture": "content captured while running in demo mode"},
                "visualReferences": [],
                "dependencies": []
            })),
        )
        .on(
            "TASK: explain",
            MockReply::json(&json!({
                "title": "Demo explanation",
                "content": "The server is running with the demo backend. Configure an API key for real answers."
            })),
        )
        .with_default(MockReply::fail("demo backend has no reply for this prompt"))
}

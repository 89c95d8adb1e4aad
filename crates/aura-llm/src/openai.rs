//! Backend for any `/chat/completions` compatible endpoint (Groq, `OpenAI`,
//! local servers).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use aura_settings::GenerationSettings;

use crate::provider::{
    GenerationBackend, GenerationRequest, ModelTier, ProviderError, ProviderResult,
};

/// Connection details for a chat-completions endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiCompatibleConfig {
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Model used for [`ModelTier::Fast`].
    pub fast_model: String,
    /// Model used for [`ModelTier::Smart`].
    pub smart_model: String,
    /// Default sampling temperature.
    pub temperature: f64,
}

impl OpenAiCompatibleConfig {
    /// Build from settings plus a resolved API key.
    #[must_use]
    pub fn from_settings(settings: &GenerationSettings, api_key: impl Into<String>) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: api_key.into(),
            fast_model: settings.fast_model.clone(),
            smart_model: settings.smart_model.clone(),
            temperature: settings.temperature,
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Smart => &self.smart_model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Non-streaming chat-completions backend.
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleBackend {
    /// Create a backend with its own HTTP client.
    pub fn new(config: OpenAiCompatibleConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("aura/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    #[instrument(skip_all, fields(tier = ?request.tier))]
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let model = self.config.model_for(request.tier);
        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature.unwrap_or(self.config.temperature),
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            let body_text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body_text, retry_after_ms));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed {
                reason: "response had no message content".into(),
            })?;

        debug!(model, chars = content.len(), "generation complete");
        Ok(content)
    }
}

/// Map a non-success HTTP status to a [`ProviderError`].
fn status_error(status: u16, body: &str, retry_after_ms: Option<u64>) -> ProviderError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        401 | 403 => ProviderError::Auth { message },
        429 => ProviderError::RateLimited {
            retry_after_ms: retry_after_ms.unwrap_or(1000),
            message,
        },
        _ => ProviderError::Api {
            status,
            message,
            retryable: status >= 500,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> OpenAiCompatibleConfig {
        OpenAiCompatibleConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".into(),
            fast_model: "fast-1".into(),
            smart_model: "smart-1".into(),
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "smart-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"title\":\"Cells\"}"}}]
            })))
            .mount(&server)
            .await;

        let backend = OpenAiCompatibleBackend::new(config(&server.uri())).unwrap();
        let out = backend
            .generate(&GenerationRequest::new("quiz", ModelTier::Smart))
            .await
            .unwrap();
        assert_eq!(out, "{\"title\":\"Cells\"}");
    }

    #[tokio::test]
    async fn fast_tier_uses_fast_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"model": "fast-1", "temperature": 0.1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "summarize"}}]
            })))
            .mount(&server)
            .await;

        let backend = OpenAiCompatibleBackend::new(config(&server.uri())).unwrap();
        let out = backend
            .generate(&GenerationRequest::new("classify", ModelTier::Fast).with_temperature(0.1))
            .await
            .unwrap();
        assert_eq!(out, "summarize");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Invalid API Key"}})),
            )
            .mount(&server)
            .await;

        let backend = OpenAiCompatibleBackend::new(config(&server.uri())).unwrap();
        let result = backend
            .generate(&GenerationRequest::new("x", ModelTier::Fast))
            .await;
        assert_matches!(result, Err(ProviderError::Auth { message }) if message == "Invalid API Key");
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let backend = OpenAiCompatibleBackend::new(config(&server.uri())).unwrap();
        let result = backend
            .generate(&GenerationRequest::new("x", ModelTier::Fast))
            .await;
        assert_matches!(result, Err(ProviderError::RateLimited { retry_after_ms: 7000, .. }));
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let backend = OpenAiCompatibleBackend::new(config(&server.uri())).unwrap();
        let result = backend
            .generate(&GenerationRequest::new("x", ModelTier::Fast))
            .await;
        assert_matches!(result, Err(ProviderError::Malformed { .. }));
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(status_error(502, "bad gateway", None).is_retryable());
        assert!(!status_error(400, "{}", None).is_retryable());
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            config("http://x/v1/").endpoint(),
            "http://x/v1/chat/completions"
        );
    }
}

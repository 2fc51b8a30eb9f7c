//! Anthropic Claude provider implementation
//!
//! This module implements the LLMProvider trait for Anthropic's Claude models.
//! See: https://docs.anthropic.com/en/api/messages

use crate::{
    CompletionRequest, CompletionResponse, Envelope, LLMError, LLMProvider, Message, Result,
    Role,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for Anthropic provider
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key; empty means not configured
    pub api_key: String,

    /// Base URL (default: "https://api.anthropic.com/v1")
    pub api_base: String,

    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: ANTHROPIC_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Anthropic Claude provider
///
/// Works with any messages-API model, e.g.:
/// - claude-3-opus-20240229
/// - claude-3-5-sonnet-20241022
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(AnthropicConfig::new(api_key))
    }

    /// Create a provider with custom configuration
    pub fn with_config(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if self.config.api_key.is_empty() {
            return Err(LLMError::ConfigurationError(
                "No API key configured for anthropic. Set ANTHROPIC_API_KEY or run `klavicle config set ai.providers.anthropic.api_key <key>`".to_string(),
            ));
        }

        debug!("Sending request to Anthropic API");

        let anthropic_request = AnthropicRequest::from_request(&request);

        let response = self
            .client
            .post(format!("{}/messages", self.config.api_base))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&anthropic_request)
            .send()
            .await
            .map_err(|e| LLMError::from_transport(e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(
                status.as_u16(),
                error_text,
                &anthropic_request.model,
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LLMError::from_transport(e, self.config.timeout_secs))?;

        let usage = Envelope::AnthropicMessages.usage(&payload);
        let stop_reason = payload.get("stop_reason").and_then(Value::as_str);
        debug!(
            stop_reason,
            tokens = usage.map(|u| u.total()),
            "Received response from Anthropic"
        );

        Ok(CompletionResponse {
            text: Envelope::AnthropicMessages.decode(&payload),
            usage,
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// Anthropic-specific request types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl AnthropicRequest {
    /// System messages move to the top-level `system` field
    fn from_request(request: &CompletionRequest) -> Self {
        let (system_messages, messages): (Vec<&Message>, Vec<&Message>) = request
            .messages
            .iter()
            .partition(|m| m.role == Role::System);

        let system = request
            .system
            .iter()
            .map(String::as_str)
            .chain(system_messages.iter().map(|m| m.content.as_str()))
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            model: request.model.clone(),
            messages: messages.into_iter().cloned().collect(),
            system: (!system.is_empty()).then_some(system),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest::builder("claude-3-opus-20240229")
            .system("Respond with JSON only.")
            .add_message(Message::user("Analyze"))
            .max_tokens(4000)
            .build()
    }

    #[test]
    fn test_provider_creation() {
        let provider = AnthropicProvider::new("test-key");
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().name(), "anthropic");
    }

    #[test]
    fn test_system_messages_are_lifted() {
        let request = CompletionRequest::builder("claude")
            .system("first")
            .add_message(Message::system("second"))
            .add_message(Message::user("hello"))
            .build();

        let body = AnthropicRequest::from_request(&request);
        assert_eq!(body.system.as_deref(), Some("first\n\nsecond"));
        assert_eq!(body.messages, vec![Message::user("hello")]);
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "{\"summary\":\"fine\"}"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 20, "output_tokens": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_config(
            AnthropicConfig::new("test-key").with_api_base(server.uri()),
        )
        .unwrap();

        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.text, "{\"summary\":\"fine\"}");
        assert_eq!(response.usage.unwrap().input_tokens, 20);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_config(
            AnthropicConfig::new("test-key").with_api_base(server.uri()),
        )
        .unwrap();

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, LLMError::RateLimitExceeded(body) if body == "slow down"));
    }
}

//! OpenAI provider implementation
//!
//! This module implements the LLMProvider trait for OpenAI's chat completions.
//! See: https://platform.openai.com/docs/api-reference/chat
//!
//! # Examples
//!
//! ```no_run
//! use klavicle_llm::{CompletionRequest, LLMProvider, Message};
//! use klavicle_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OpenAIConfig::new("sk-...").with_timeout(60);
//!     let provider = OpenAIProvider::with_config(config)?;
//!
//!     let request = CompletionRequest::builder("gpt-4o")
//!         .add_message(Message::user("Summarize these campaigns"))
//!         .json_mode(true)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.text);
//!     Ok(())
//! }
//! ```

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

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for OpenAI provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication; empty means not configured
    pub api_key: String,

    /// Base URL for the OpenAI API (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// OpenAI chat completions provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if self.config.api_key.is_empty() {
            return Err(LLMError::ConfigurationError(
                "No API key configured for openai. Set OPENAI_API_KEY or run `klavicle config set ai.providers.openai.api_key <key>`".to_string(),
            ));
        }

        debug!("Sending request to OpenAI API at {}", self.config.api_base);

        let model = request.model.clone();
        let body = OpenAIRequest::from_request(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::from_transport(e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status.as_u16(), error_text, &model));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LLMError::from_transport(e, self.config.timeout_secs))?;

        let usage = Envelope::OpenAIChat.usage(&payload);
        debug!(
            input_tokens = usage.map(|u| u.input_tokens),
            output_tokens = usage.map(|u| u.output_tokens),
            "Received response from OpenAI"
        );

        Ok(CompletionResponse {
            text: Envelope::OpenAIChat.decode(&payload),
            usage,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

impl OpenAIRequest {
    fn from_request(request: &CompletionRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: build_openai_messages(request.system.as_deref(), &request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_mode.then(|| ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// OpenAI carries the system prompt as the first message
fn build_openai_messages(system: Option<&str>, messages: &[Message]) -> Vec<OpenAIMessage> {
    let system = system.map(|content| OpenAIMessage {
        role: "system",
        content: content.to_string(),
    });

    system
        .into_iter()
        .chain(messages.iter().map(|msg| OpenAIMessage {
            role: match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            },
            content: msg.content.clone(),
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest::builder("gpt-4o")
            .system("Respond with JSON only.")
            .add_message(Message::user("Analyze"))
            .temperature(0.3)
            .json_mode(true)
            .build()
    }

    fn provider_for(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::with_config(OpenAIConfig::new("sk-test").with_api_base(server.uri()))
            .unwrap()
    }

    #[test]
    fn test_config_builder() {
        let config = OpenAIConfig::new("key")
            .with_api_base("http://localhost:8000/v1")
            .with_timeout(30);

        assert_eq!(config.api_key, "key");
        assert_eq!(config.api_base, "http://localhost:8000/v1");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_system_prompt_leads_messages() {
        let messages = build_openai_messages(Some("sys"), &[Message::user("hi")]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "hi");
    }

    #[test]
    fn test_request_serialization() {
        let body = serde_json::to_value(OpenAIRequest::from_request(&request())).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"summary\":\"ok\"}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider_for(&server).complete(request()).await.unwrap();
        assert_eq!(response.text, "{\"summary\":\"ok\"}");
        assert_eq!(response.usage.unwrap().total(), 16);
    }

    #[tokio::test]
    async fn test_complete_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = provider_for(&server).complete(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "API returned 500: boom");
    }

    #[tokio::test]
    async fn test_complete_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let provider = OpenAIProvider::with_config(
            OpenAIConfig::new("sk-test")
                .with_api_base(server.uri())
                .with_timeout(1),
        )
        .unwrap();

        let err = provider.complete(request()).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let provider = OpenAIProvider::new("").unwrap();
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, LLMError::ConfigurationError(_)));
    }
}

//! Gateway: the single entry point the analysis layer uses to reach a model
//!
//! The gateway owns the model settings (temperature, output limit, the
//! JSON-only system instruction) and enforces the call timeout on top of
//! whatever the provider does internally.

use crate::{CompletionRequest, LLMError, LLMProvider, Message, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default sampling temperature for analysis calls
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default output token limit
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 4000;

/// Default per-call timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const JSON_ONLY_INSTRUCTION: &str = "You are a marketing analytics assistant. \
Respond with a single valid JSON object and no other text.";

/// Model settings applied to every gateway call
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: usize,
    pub system_instruction: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            system_instruction: JSON_ONLY_INSTRUCTION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Sends prompts to one provider with fixed model settings
#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn LLMProvider>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(provider: Arc<dyn LLMProvider>, config: GatewayConfig) -> Self {
        Self { provider, config }
    }

    /// Name of the backing provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Send a prompt and return the raw reply text
    ///
    /// Transport failures, non-success statuses, a missing credential and the
    /// timeout all surface as [`LLMError`].
    #[instrument(skip(self, prompt), fields(provider = %self.provider.name(), model = %self.config.model))]
    pub async fn send(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest::builder(self.config.model.clone())
            .system(self.config.system_instruction.clone())
            .add_message(Message::user(prompt))
            .max_tokens(self.config.max_output_tokens)
            .temperature(self.config.temperature)
            .json_mode(true)
            .build();

        debug!(prompt_chars = prompt.len(), "Sending analysis prompt");

        let response = tokio::time::timeout(self.config.timeout, self.provider.complete(request))
            .await
            .map_err(|_| LLMError::Timeout(self.config.timeout.as_secs()))??;

        if let Some(usage) = response.usage {
            debug!(tokens = usage.total(), "Gateway call finished");
        }

        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletionResponse, providers::MockProvider};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the last request and answers after an optional delay
    struct RecordingProvider {
        delay: Duration,
        last: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            *self.last.lock().unwrap() = Some(request);
            tokio::time::sleep(self.delay).await;
            Ok(CompletionResponse::text("{}"))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_send_applies_model_settings() {
        let provider = Arc::new(RecordingProvider {
            delay: Duration::ZERO,
            last: Mutex::new(None),
        });
        let gateway = Gateway::new(provider.clone(), GatewayConfig::new("gpt-4o"));

        let text = gateway.send("hello").await.unwrap();
        assert_eq!(text, "{}");

        let request = provider.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, DEFAULT_MAX_OUTPUT_TOKENS);
        assert_eq!(request.temperature, Some(DEFAULT_TEMPERATURE));
        assert!(request.json_mode);
        assert_eq!(request.prompt(), Some("hello"));
        assert!(request.system.unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn test_send_times_out() {
        let provider = Arc::new(RecordingProvider {
            delay: Duration::from_millis(200),
            last: Mutex::new(None),
        });
        let gateway = Gateway::new(
            provider,
            GatewayConfig::new("slow").with_timeout(Duration::from_millis(20)),
        );

        let err = gateway.send("hello").await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_send_through_mock() {
        let gateway = Gateway::new(Arc::new(MockProvider::new()), GatewayConfig::new("mock-model"));
        assert_eq!(gateway.provider_name(), "mock");

        let text = gateway
            .send("You are analyzing Klaviyo list data.\n\nDATA (potentially truncated for preview):\n```json\n[]\n```")
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("summary").is_some());
    }
}

//! LLM provider trait and backend selection

use crate::providers::MockProvider;
use crate::{CompletionRequest, CompletionResponse, LLMError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Trait for LLM providers
///
/// Implementations of this trait provide access to different LLM services
/// (OpenAI, Anthropic) or the offline mock. A provider returns the reply
/// already unwrapped to plain text.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    ///
    /// # Arguments
    ///
    /// * `request` - The completion request with messages and parameters
    ///
    /// # Returns
    ///
    /// The reply text and usage metadata
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "anthropic", "openai")
    fn name(&self) -> &str;
}

/// Backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAI,
    /// Anthropic messages
    Anthropic,
    /// Deterministic offline backend
    Mock,
}

impl ProviderKind {
    /// Lowercase name used in configuration keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        }
    }

    /// Whether the backend needs an API key
    pub fn requires_credential(&self) -> bool {
        !matches!(self, Self::Mock)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            other => Err(LLMError::ConfigurationError(format!(
                "Unsupported provider: {other}"
            ))),
        }
    }
}

/// Build the provider for a backend
///
/// A missing credential for a real backend is only logged here; the provider
/// reports a configuration error on its first call.
pub fn create_provider(kind: ProviderKind, api_key: Option<String>) -> Result<Arc<dyn LLMProvider>> {
    if kind.requires_credential() && api_key.is_none() {
        warn!(
            provider = %kind,
            "No API key provided. Set {}_API_KEY or store one in the config file",
            kind.as_str().to_uppercase()
        );
    }

    match kind {
        ProviderKind::Mock => Ok(Arc::new(MockProvider::new())),
        #[cfg(feature = "openai")]
        ProviderKind::OpenAI => {
            use crate::providers::{OpenAIConfig, OpenAIProvider};
            let config = OpenAIConfig::new(api_key.unwrap_or_default());
            Ok(Arc::new(OpenAIProvider::with_config(config)?))
        }
        #[cfg(feature = "anthropic")]
        ProviderKind::Anthropic => {
            use crate::providers::{AnthropicConfig, AnthropicProvider};
            let config = AnthropicConfig::new(api_key.unwrap_or_default());
            Ok(Arc::new(AnthropicProvider::with_config(config)?))
        }
        #[allow(unreachable_patterns)]
        other => Err(LLMError::ConfigurationError(format!(
            "{other} support was not compiled in"
        ))),
    }
}

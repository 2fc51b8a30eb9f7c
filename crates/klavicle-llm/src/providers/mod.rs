//! Concrete LLM provider implementations
//!
//! This module contains implementations of the LLMProvider trait for
//! each supported backend.

#[cfg(feature = "anthropic")]
pub mod anthropic;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mock::MockProvider;
#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};

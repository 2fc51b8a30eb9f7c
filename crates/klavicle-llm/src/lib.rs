//! LLM gateway for klavicle
//!
//! This crate turns an analysis prompt into raw response text. It includes:
//!
//! - Message and completion request/response types
//! - The [`LLMProvider`] trait, one implementation per backend
//! - Per-backend response envelope decoders ([`Envelope`])
//! - A deterministic [`providers::MockProvider`] for offline runs and tests
//! - The [`Gateway`], which applies model settings and the call timeout
//!
//! # Example
//!
//! ```no_run
//! use klavicle_llm::{Gateway, GatewayConfig, ProviderKind, create_provider};
//!
//! # async fn run() -> klavicle_llm::Result<()> {
//! let provider = create_provider(ProviderKind::Mock, None)?;
//! let gateway = Gateway::new(provider, GatewayConfig::new("mock-model"));
//! let text = gateway.send("You are analyzing Klaviyo list data.").await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod messages;
pub mod provider;
pub mod providers;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use envelope::Envelope;
pub use error::{LLMError, Result};
pub use gateway::{Gateway, GatewayConfig};
pub use messages::{Message, Role};
pub use provider::{LLMProvider, ProviderKind, create_provider};

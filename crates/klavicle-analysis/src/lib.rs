//! AI analysis of Klaviyo marketing data
//!
//! This crate turns exported Klaviyo campaigns, flows and lists into
//! structured insights produced by a language model. It includes:
//!
//! - Tolerant normalization of model output into JSON objects
//! - A file-backed result cache keyed by a content fingerprint
//! - Entity-specific prompt templates
//! - Token-aware batching with merge and deduplication of partial results
//! - Date range filtering of records
//! - A two-phase unified account analysis
//!
//! # Architecture
//!
//! [`AnalysisOrchestrator`] owns every component and is the single entry
//! point. The model is reached through a [`klavicle_llm::Gateway`], so any
//! provider (including the deterministic mock) can be plugged in.
//!
//! # Example
//!
//! ```rust,ignore
//! use klavicle_analysis::{AnalysisConfig, AnalysisOrchestrator, AnalysisRequest, EntityType};
//! use klavicle_llm::{Gateway, GatewayConfig, providers::MockProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = Gateway::new(Arc::new(MockProvider::new()), GatewayConfig::new("mock-model"));
//!     let orchestrator = AnalysisOrchestrator::new(gateway, AnalysisConfig::default());
//!
//!     let campaigns = serde_json::json!([{"id": "c1", "name": "Spring Sale"}]);
//!     let result = orchestrator
//!         .analyze(AnalysisRequest::new(EntityType::Campaigns, campaigns))
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!
//!     Ok(())
//! }
//! ```

pub mod batcher;
pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod result;
pub mod source;

pub use batcher::{Batch, BatchSource, Batcher, merge_results};
pub use cache::{CacheKey, ResultCache};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use entity::{AnalysisContext, AnalysisRequest, DateRange, EntityType, Payload};
pub use error::{AnalysisError, Result};
pub use normalizer::normalize;
pub use orchestrator::AnalysisOrchestrator;
pub use prompts::PromptBuilder;
pub use result::AnalysisResult;
pub use source::{
    EntitySource, JsonFileSource, StaticSource, collect_payload, collect_unified_payload,
    sample_data,
};

//! Analysis orchestration
//!
//! ```text
//! CACHE_CHECK ─ hit ──────────────────────────────────────────▶ done
//!      └ miss ─▶ FILTER ─▶ ROUTE ─┬ unified ─▶ phase 1 (per entity, concurrent)
//!                                 │              └▶ phase 2 (one synthesis call)
//!                                 └ entity ──▶ single shot | batches ─▶ merge
//!                                                      └──────────────▶ CACHE_WRITE
//! ```
//!
//! The public entry points never fail: every error is converted into an
//! error-shaped [`AnalysisResult`].

use crate::batcher::{Batcher, merge_results};
use crate::cache::{CacheKey, ResultCache};
use crate::config::AnalysisConfig;
use crate::entity::{AnalysisContext, AnalysisRequest, DateRange, EntityType};
use crate::error::{AnalysisError, Result};
use crate::filter::filter_payload;
use crate::normalizer::normalize;
use crate::prompts::{PromptBuilder, truncate_chars};
use crate::result::AnalysisResult;
use futures::stream::{self, StreamExt};
use klavicle_llm::{Gateway, GatewayConfig, ProviderKind, create_provider};
use klavicle_utils::CredentialStore;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, instrument, warn};

/// Fields carried from each per-entity result into the unified synthesis
const DIGEST_FIELDS: [&str; 8] = [
    "summary",
    "key_metrics",
    "top_performing",
    "underperforming",
    "trends",
    "recommendations",
    "critical_issues",
    "error",
];

/// Input of the unified synthesis prompt
#[derive(Debug, Serialize)]
struct UnifiedDigest {
    raw_metrics: RawMetrics,
    entity_analyses: Map<String, Value>,
    raw_data_preview: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct RawMetrics {
    campaign_count: usize,
    flow_count: usize,
    list_count: usize,
}

impl RawMetrics {
    fn from_payload(data: &Map<String, Value>) -> Self {
        let count = |key: &str| data.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        Self {
            campaign_count: count("campaigns"),
            flow_count: count("flows"),
            list_count: count("lists"),
        }
    }
}

/// Coordinates cache, prompts, batching and the gateway
pub struct AnalysisOrchestrator {
    gateway: Gateway,
    cache: ResultCache,
    prompts: PromptBuilder,
    batcher: Batcher,
    config: AnalysisConfig,
}

impl AnalysisOrchestrator {
    pub fn new(gateway: Gateway, config: AnalysisConfig) -> Self {
        Self {
            cache: ResultCache::new(config.cache_dir.clone(), config.cache_ttl),
            prompts: PromptBuilder::new(config.data_preview_chars),
            batcher: Batcher::new(config.batch_size, config.max_tokens),
            gateway,
            config,
        }
    }

    /// Build the gateway from stored credentials
    ///
    /// `provider` and `model` fall back to the store's defaults.
    pub fn from_credentials(
        store: &dyn CredentialStore,
        provider: Option<ProviderKind>,
        model: Option<String>,
        config: AnalysisConfig,
    ) -> Result<Self> {
        let kind = match provider {
            Some(kind) => kind,
            None => store.get_default_provider().parse()?,
        };
        let model = model.unwrap_or_else(|| store.get_default_model(kind.as_str()));
        let provider = create_provider(kind, store.get_credential(kind.as_str()))?;

        info!(provider = %kind, model = %model, "Configured AI provider");
        Ok(Self::new(
            Gateway::new(provider, GatewayConfig::new(model)),
            config,
        ))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Date range on the configured date field
    pub fn date_range(&self, start: Option<String>, end: Option<String>) -> DateRange {
        DateRange::new(start, end).with_field(self.config.date_field.clone())
    }

    /// Analyze a request, using the cache unless `force_refresh` is set
    #[instrument(skip(self, request), fields(entity_type = %request.entity_type, force_refresh = request.force_refresh))]
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        match self.run(request).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "AI analysis failed");
                e.into()
            }
        }
    }

    /// Analyze bypassing the cache lookup; the fresh result is still stored
    pub async fn refresh(&self, request: AnalysisRequest) -> AnalysisResult {
        self.analyze(request.force_refresh(true)).await
    }

    /// Delete cached results for one entity type, or all of them
    pub async fn clear_cache(&self, entity_type: Option<EntityType>) -> usize {
        let removed = self.cache.clear(entity_type).await;
        info!(removed, "Cleared analysis cache");
        removed
    }

    async fn run(&self, request: AnalysisRequest) -> Result<AnalysisResult> {
        let AnalysisRequest {
            entity_type,
            payload,
            context,
            date_range,
            force_refresh,
        } = request;

        let payload = payload.into_value()?;
        let context = context.as_ref();
        let key = CacheKey::new(entity_type, &payload, context, date_range.as_ref());

        self.cache
            .get_or_compute(&key, force_refresh, || async move {
                let data = match &date_range {
                    Some(range) => filter_payload(payload, range)?,
                    None => payload,
                };

                match entity_type {
                    EntityType::Unified => self.analyze_unified(data, context, force_refresh).await,
                    other => self.analyze_entity(other, data, context).await,
                }
            })
            .await
    }

    /// Single-shot or batched analysis of one entity type
    async fn analyze_entity(
        &self,
        entity_type: EntityType,
        data: Value,
        context: Option<&AnalysisContext>,
    ) -> Result<AnalysisResult> {
        if self.batcher.needs_batching(&data) {
            if let Value::Array(items) = &data {
                return Ok(self.analyze_batched(entity_type, items, context).await);
            }
            warn!("Payload exceeds token budget but is not a record list, sending a preview");
        }
        self.analyze_once(entity_type, &data, context).await
    }

    /// One prompt, one gateway call, one normalization
    async fn analyze_once(
        &self,
        entity_type: EntityType,
        data: &Value,
        context: Option<&AnalysisContext>,
    ) -> Result<AnalysisResult> {
        let data_text = serde_json::to_string_pretty(data)?;
        let prompt = self.prompts.build(entity_type, &data_text, context)?;
        let raw = self.gateway.send(&prompt).await?;
        Ok(normalize(&raw))
    }

    /// Analyze each batch independently and merge what succeeded
    async fn analyze_batched(
        &self,
        entity_type: EntityType,
        items: &[Value],
        context: Option<&AnalysisContext>,
    ) -> AnalysisResult {
        let batches = self.batcher.make_batches(items);
        let total = batches.len();
        info!(total, records = items.len(), "Payload exceeds token budget, analyzing in batches");

        let outcomes: Vec<_> = stream::iter(batches.into_iter().enumerate().map(|(i, batch)| {
            let mut batch_context = context.cloned().unwrap_or_default();
            batch_context.insert(
                "batch",
                format!("{} of {} ({})", i + 1, total, batch.source.label()),
            );
            let data = Value::Array(batch.items);
            async move {
                let outcome = self.analyze_once(entity_type, &data, Some(&batch_context)).await;
                (batch.source, outcome)
            }
        }))
        .buffered(self.config.batch_concurrency.max(1))
        .collect()
        .await;

        let mut succeeded = Vec::with_capacity(total);
        for (source, outcome) in outcomes {
            match outcome {
                Ok(result) if !result.is_error() => succeeded.push(result),
                Ok(result) => warn!(
                    batch = %source.label(),
                    error = result.error().unwrap_or_default(),
                    "Batch analysis returned an error, skipping"
                ),
                Err(e) => warn!(batch = %source.label(), error = %e, "Batch analysis failed, skipping"),
            }
        }

        merge_results(&succeeded, total).unwrap_or_else(|| {
            let mut failed = AnalysisResult::failure(format!("All {total} batches failed"));
            failed.insert(
                "batch_stats",
                json!({"total": total, "succeeded": 0, "failed": total}),
            );
            failed
        })
    }

    /// Two-phase unified analysis
    async fn analyze_unified(
        &self,
        data: Value,
        context: Option<&AnalysisContext>,
        force_refresh: bool,
    ) -> Result<AnalysisResult> {
        let Value::Object(data) = data else {
            return Err(AnalysisError::validation(
                "Unified analysis expects an object with campaigns, flows and lists",
                data.to_string(),
            ));
        };

        let raw_metrics = RawMetrics::from_payload(&data);

        // Phase 1: each non-empty collection on its own, concurrently
        let parts: Vec<(EntityType, Value)> = EntityType::UNIFIED_PARTS
            .into_iter()
            .filter_map(|part| match data.get(part.as_str()) {
                Some(Value::Array(items)) if !items.is_empty() => {
                    Some((part, Value::Array(items.clone())))
                }
                _ => None,
            })
            .collect();

        info!(parts = parts.len(), "Running per-entity analyses");
        let analyses = futures::future::join_all(parts.into_iter().map(|(part, payload)| async move {
            let key = CacheKey::new(part, &payload, context, None);
            let result = self
                .cache
                .get_or_compute(&key, force_refresh, || self.analyze_entity(part, payload, context))
                .await
                .unwrap_or_else(|e| {
                    warn!(entity_type = %part, error = %e, "Sub-analysis failed");
                    e.into()
                });
            (part, result)
        }))
        .await;

        // Phase 2: one synthesis call over the digest
        let digest = UnifiedDigest {
            raw_metrics,
            entity_analyses: analyses
                .iter()
                .map(|(part, result)| (part.as_str().to_string(), digest_fields(result)))
                .collect(),
            raw_data_preview: truncate_chars(
                &Value::Object(data.clone()).to_string(),
                self.config.unified_preview_chars,
            )
            .to_string(),
        };
        let digest_text = serde_json::to_string(&digest)?;
        debug!(chars = digest_text.len(), "Built unified digest");

        let prompt = self.prompts.build(EntityType::Unified, &digest_text, context)?;
        let raw = self.gateway.send(&prompt).await?;
        let mut result = normalize(&raw);
        result.insert("raw_metrics", serde_json::to_value(raw_metrics)?);
        Ok(result)
    }
}

/// Subset of a per-entity result used in the unified digest
fn digest_fields(result: &AnalysisResult) -> Value {
    let fields: Map<String, Value> = DIGEST_FIELDS
        .iter()
        .filter_map(|field| Some((field.to_string(), result.get(field)?.clone())))
        .collect();
    Value::Object(fields)
}

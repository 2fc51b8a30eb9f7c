//! Entity sources
//!
//! The analysis core never talks to the marketing API itself. It consumes an
//! [`EntitySource`], which hands back already-paginated, flattened records for
//! one entity type.

use crate::entity::EntityType;
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Source of entity records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// All records of one entity type
    async fn fetch(&self, entity_type: EntityType) -> Result<Vec<Value>>;
}

/// In-memory records keyed by entity type
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: HashMap<EntityType, Vec<Value>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, entity_type: EntityType, records: Vec<Value>) -> Self {
        self.records.insert(entity_type, records);
        self
    }

    /// Build from an object keyed by entity type name
    ///
    /// `{"campaigns": [...], "flows": [...], "lists": [...]}`; non-array
    /// members are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(AnalysisError::validation(
                "Entity data must be a JSON object keyed by entity type",
                value.to_string(),
            ));
        };

        let mut source = Self::new();
        for (name, records) in map {
            match records {
                Value::Array(items) => {
                    source.records.insert(EntityType::from_name(&name), items);
                }
                other => {
                    return Err(AnalysisError::validation(
                        format!("Entity data for '{name}' must be an array"),
                        other.to_string(),
                    ));
                }
            }
        }
        Ok(source)
    }

    /// Synthetic account used for offline runs
    pub fn sample() -> Self {
        // from_value only fails on non-object input
        Self::from_value(sample_data()).unwrap_or_default()
    }
}

#[async_trait]
impl EntitySource for StaticSource {
    async fn fetch(&self, entity_type: EntityType) -> Result<Vec<Value>> {
        Ok(self.records.get(&entity_type).cloned().unwrap_or_default())
    }
}

/// Records exported to a JSON file
///
/// The file holds either an object keyed by entity type, or a bare array that
/// is served for every type.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EntitySource for JsonFileSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch(&self, entity_type: EntityType) -> Result<Vec<Value>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::validation(format!("Invalid JSON data: {e}"), text.clone()))?;

        let records = match value {
            Value::Array(items) => items,
            Value::Object(_) => StaticSource::from_value(value)?.fetch(entity_type).await?,
            other => {
                return Err(AnalysisError::validation(
                    "Entity file must hold a JSON array or object",
                    other.to_string(),
                ));
            }
        };

        debug!(count = records.len(), %entity_type, "Loaded records from file");
        Ok(records)
    }
}

/// Fetch campaigns, flows and lists concurrently into one unified payload
pub async fn collect_unified_payload(source: &dyn EntitySource) -> Result<Value> {
    let (campaigns, flows, lists) = tokio::join!(
        source.fetch(EntityType::Campaigns),
        source.fetch(EntityType::Flows),
        source.fetch(EntityType::Lists),
    );

    let mut payload = Map::new();
    payload.insert("campaigns".to_string(), Value::Array(campaigns?));
    payload.insert("flows".to_string(), Value::Array(flows?));
    payload.insert("lists".to_string(), Value::Array(lists?));
    Ok(Value::Object(payload))
}

/// Fetch the payload an analysis of `entity_type` expects
///
/// Unified runs get the combined object; everything else gets a record array.
/// Tag analysis reads tags off all three collections, so it also gets the
/// combined object.
pub async fn collect_payload(source: &dyn EntitySource, entity_type: EntityType) -> Result<Value> {
    match entity_type {
        EntityType::Unified | EntityType::Tags => collect_unified_payload(source).await,
        other => Ok(Value::Array(source.fetch(other).await?)),
    }
}

/// Synthetic Klaviyo account: three campaigns, three flows, three lists
pub fn sample_data() -> Value {
    json!({
        "campaigns": [
            {
                "id": "mock_campaign_1",
                "name": "Mock Newsletter Campaign",
                "status": "sent",
                "created": "2024-01-01T10:00:00Z",
                "updated": "2024-01-05T12:00:00Z",
                "send_time": "2024-01-10T08:00:00Z",
                "channel": "email",
                "subject_line": "Check out our new products!",
                "tags": ["newsletter", "product:launch", "audience:all"],
                "metrics": {"recipient_count": 5000, "open_rate": 0.22, "click_rate": 0.08, "revenue": 1200.0}
            },
            {
                "id": "mock_campaign_2",
                "name": "Mock Sale Announcement",
                "status": "sent",
                "created": "2024-02-01T10:00:00Z",
                "updated": "2024-02-05T12:00:00Z",
                "send_time": "2024-02-10T08:00:00Z",
                "channel": "email",
                "subject_line": "50% Off Sale - This Weekend Only!",
                "tags": ["promotion", "sale", "audience:active"],
                "metrics": {"recipient_count": 8000, "open_rate": 0.35, "click_rate": 0.12, "revenue": 5600.0}
            },
            {
                "id": "mock_campaign_3",
                "name": "Mock Product Announcement",
                "status": "sent",
                "created": "2024-03-01T10:00:00Z",
                "updated": "2024-03-05T12:00:00Z",
                "send_time": "2024-03-10T08:00:00Z",
                "channel": "email",
                "subject_line": "Introducing Our New Product Line",
                "tags": ["product:launch", "announcement", "audience:all"],
                "metrics": {"recipient_count": 12000, "open_rate": 0.28, "click_rate": 0.09, "revenue": 3200.0}
            }
        ],
        "flows": [
            {
                "id": "mock_flow_1",
                "name": "Mock Welcome Series",
                "status": "live",
                "archived": false,
                "created": "2023-01-15T10:00:00Z",
                "updated": "2024-01-20T12:00:00Z",
                "trigger_type": "signup",
                "structure": {"action_count": 5, "email_count": 3, "sms_count": 1, "time_delay_count": 3},
                "tags": ["onboarding", "automation:welcome", "audience:new"]
            },
            {
                "id": "mock_flow_2",
                "name": "Mock Abandoned Cart",
                "status": "live",
                "archived": false,
                "created": "2023-02-15T10:00:00Z",
                "updated": "2024-02-20T12:00:00Z",
                "trigger_type": "abandoned_cart",
                "structure": {"action_count": 6, "email_count": 3, "sms_count": 2, "time_delay_count": 4},
                "tags": ["cart", "recovery", "automation:cart"]
            },
            {
                "id": "mock_flow_3",
                "name": "Mock Re-engagement",
                "status": "draft",
                "archived": false,
                "created": "2023-03-15T10:00:00Z",
                "updated": "2024-03-20T12:00:00Z",
                "trigger_type": "metric_triggered",
                "structure": {"action_count": 4, "email_count": 3, "sms_count": 0, "time_delay_count": 2},
                "tags": ["re-engagement", "win-back", "audience:inactive"]
            }
        ],
        "lists": [
            {
                "id": "mock_list_1",
                "name": "Mock Newsletter Subscribers",
                "created": "2023-01-10T10:00:00Z",
                "updated": "2024-01-15T12:00:00Z",
                "profile_count": 25000,
                "is_dynamic": false,
                "folder_name": "Main Lists",
                "tags": ["newsletter", "source:website", "opt-in:explicit"]
            },
            {
                "id": "mock_list_2",
                "name": "Mock High Value Customers",
                "created": "2023-02-10T10:00:00Z",
                "updated": "2024-02-15T12:00:00Z",
                "profile_count": 5000,
                "is_dynamic": true,
                "folder_name": "Segments",
                "tags": ["high-value", "segment:value", "behavior:purchase"]
            },
            {
                "id": "mock_list_3",
                "name": "Mock VIP Members",
                "created": "2023-03-10T10:00:00Z",
                "updated": "2024-03-15T12:00:00Z",
                "profile_count": 1000,
                "is_dynamic": true,
                "folder_name": "VIP",
                "tags": ["vip", "segment:loyalty", "tier:gold"]
            }
        ]
    })
}

//! Entity types and analysis requests

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Entity type: selects the prompt template and result shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Campaigns,
    Flows,
    Lists,
    Tags,
    Unified,
    Generic,
}

impl EntityType {
    /// Sub-collections analyzed in the first phase of a unified run
    pub const UNIFIED_PARTS: [EntityType; 3] = [Self::Campaigns, Self::Flows, Self::Lists];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Campaigns => "campaigns",
            Self::Flows => "flows",
            Self::Lists => "lists",
            Self::Tags => "tags",
            Self::Unified => "unified",
            Self::Generic => "generic",
        }
    }

    /// Parse a type name; unknown names map to [`EntityType::Generic`]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "campaigns" | "campaign" => Self::Campaigns,
            "flows" | "flow" => Self::Flows,
            "lists" | "list" => Self::Lists,
            "tags" | "tag" => Self::Tags,
            "unified" => Self::Unified,
            _ => Self::Generic,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw request payload: parsed JSON, or text that still has to be parsed
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// Parse into JSON; malformed text is a validation error
    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Text(text) => serde_json::from_str(&text).map_err(|e| {
                AnalysisError::validation(format!("Invalid JSON data: {e}"), text)
            }),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Vec<Value>> for Payload {
    fn from(items: Vec<Value>) -> Self {
        Self::Json(Value::Array(items))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Free-form `key: value` instructions, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisContext {
    entries: Vec<(String, String)>,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry; a replaced entry keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ordered `[key, value]` pairs, used for fingerprinting
    pub fn to_value(&self) -> Value {
        Value::Array(self.entries.iter().map(|(k, v)| json!([k, v])).collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnalysisContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (k, v) in iter {
            context.insert(k, v);
        }
        context
    }
}

/// Default record field used for date filtering
pub const DEFAULT_DATE_FIELD: &str = "created";

/// Inclusive date range applied to a record field before analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
    pub field: String,
}

impl DateRange {
    pub fn new(start: Option<String>, end: Option<String>) -> Self {
        Self {
            start,
            end,
            field: DEFAULT_DATE_FIELD.to_string(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// A range with neither bound filters nothing
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn to_value(&self) -> Value {
        json!({"start": self.start, "end": self.end, "field": self.field})
    }
}

/// One analysis request; immutable once built
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub entity_type: EntityType,
    pub payload: Payload,
    pub context: Option<AnalysisContext>,
    pub date_range: Option<DateRange>,
    pub force_refresh: bool,
}

impl AnalysisRequest {
    pub fn new(entity_type: EntityType, payload: impl Into<Payload>) -> Self {
        Self {
            entity_type,
            payload: payload.into(),
            context: None,
            date_range: None,
            force_refresh: false,
        }
    }

    pub fn with_context(mut self, context: AnalysisContext) -> Self {
        self.context = (!context.is_empty()).then_some(context);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = (!range.is_unbounded()).then_some(range);
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

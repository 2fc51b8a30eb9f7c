//! Analysis result type

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const SUMMARY: &str = "summary";
pub const ERROR: &str = "error";
pub const RAW_RESPONSE: &str = "raw_response";
pub const RAW_TEXT: &str = "raw_text";
pub const RECOMMENDATIONS: &str = "recommendations";

const MISSING_SUMMARY: &str = "No summary provided.";
const PARSE_FAILURE: &str = "Failed to parse AI response as JSON";
const PARSE_FAILURE_SUMMARY: &str = "The AI response couldn't be structured properly.";
const ANALYSIS_FAILURE_SUMMARY: &str = "AI analysis failed. See error for details.";
const VALIDATION_FAILURE_SUMMARY: &str = "The analysis request was rejected before any AI call.";

/// Structured analysis output
///
/// A plain JSON object. It always carries `summary`; failures additionally
/// carry `error` plus `raw_response` (provider/parse failures) or `raw_text`
/// (rejected input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(Map<String, Value>);

impl AnalysisResult {
    /// Wrap a parsed object so it always carries `summary`
    ///
    /// An object with `error` gets the failure summary and an empty
    /// `raw_response` when it has no raw field of its own.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        if map.contains_key(ERROR) {
            if !map.contains_key(SUMMARY) {
                map.insert(SUMMARY.to_string(), Value::String(ANALYSIS_FAILURE_SUMMARY.to_string()));
            }
            if !map.contains_key(RAW_RESPONSE) && !map.contains_key(RAW_TEXT) {
                map.insert(RAW_RESPONSE.to_string(), Value::String(String::new()));
            }
        } else if !map.contains_key(SUMMARY) {
            map.insert(SUMMARY.to_string(), Value::String(MISSING_SUMMARY.to_string()));
        }
        Self(map)
    }

    /// Wrap an object parsed from a model reply; an error-shaped reply keeps
    /// the reply text as `raw_response`
    pub fn from_reply(mut map: Map<String, Value>, raw_response: &str) -> Self {
        if map.contains_key(ERROR) && !map.contains_key(RAW_RESPONSE) && !map.contains_key(RAW_TEXT) {
            map.insert(RAW_RESPONSE.to_string(), Value::String(raw_response.to_string()));
        }
        Self::from_map(map)
    }

    /// Result for a reply that could not be structured
    pub fn parse_failure(raw_response: &str) -> Self {
        Self::failure_with(PARSE_FAILURE, PARSE_FAILURE_SUMMARY, RAW_RESPONSE, raw_response)
    }

    /// Result for a failed analysis step (gateway, template, IO)
    pub fn failure(message: impl Into<String>) -> Self {
        Self::failure_with(message, ANALYSIS_FAILURE_SUMMARY, RAW_RESPONSE, "")
    }

    /// Result for rejected input; no gateway call was made
    pub fn validation_failure(message: impl Into<String>, raw_text: &str) -> Self {
        Self::failure_with(message, VALIDATION_FAILURE_SUMMARY, RAW_TEXT, raw_text)
    }

    fn failure_with(message: impl Into<String>, summary: &str, raw_key: &str, raw: &str) -> Self {
        let mut map = Map::new();
        map.insert(ERROR.to_string(), Value::String(message.into()));
        map.insert(SUMMARY.to_string(), Value::String(summary.to_string()));
        map.insert(raw_key.to_string(), Value::String(raw.to_string()));
        map.insert(RECOMMENDATIONS.to_string(), json!([]));
        Self(map)
    }

    pub fn is_error(&self) -> bool {
        self.0.contains_key(ERROR)
    }

    pub fn summary(&self) -> Option<&str> {
        self.0.get(SUMMARY).and_then(Value::as_str)
    }

    pub fn error(&self) -> Option<&str> {
        self.0.get(ERROR).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// JSON pointer lookup, e.g. `/key_metrics/campaign_count`
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        if pointer.is_empty() {
            return None;
        }
        let rest = pointer.strip_prefix('/')?;
        let (head, tail) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        let value = self.0.get(&head.replace("~1", "/").replace("~0", "~"))?;
        if tail.is_empty() {
            Some(value)
        } else {
            value.pointer(tail)
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<AnalysisError> for AnalysisResult {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Validation { message, raw_text } => {
                Self::validation_failure(message, &raw_text)
            }
            other => Self::failure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_summary_is_filled() {
        let mut map = Map::new();
        map.insert("recommendations".to_string(), json!([]));
        let result = AnalysisResult::from_map(map);

        assert_eq!(result.summary(), Some("No summary provided."));
        assert!(!result.is_error());
    }

    #[test]
    fn test_error_without_summary_gets_failure_shape() {
        let mut map = Map::new();
        map.insert("error".to_string(), json!("model refused"));
        let result = AnalysisResult::from_map(map);

        assert!(result.is_error());
        assert_eq!(result.summary(), Some("AI analysis failed. See error for details."));
        assert_eq!(result.get("raw_response"), Some(&json!("")));
    }

    #[test]
    fn test_error_reply_keeps_raw_text() {
        let raw = r#"{"error": "cannot analyze"}"#;
        let map = serde_json::from_str::<Value>(raw)
            .unwrap()
            .as_object()
            .cloned()
            .unwrap();
        let result = AnalysisResult::from_reply(map, raw);

        assert_eq!(result.error(), Some("cannot analyze"));
        assert!(result.summary().is_some());
        assert_eq!(result.get("raw_response"), Some(&json!(raw)));
    }

    #[test]
    fn test_error_with_own_summary_is_untouched() {
        let result = AnalysisResult::from_map(
            json!({"error": "partial", "summary": "mine", "raw_text": "x"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(result.summary(), Some("mine"));
        assert!(result.get("raw_response").is_none());
    }

    #[test]
    fn test_failure_shapes() {
        let parse = AnalysisResult::parse_failure("just prose");
        assert_eq!(parse.error(), Some("Failed to parse AI response as JSON"));
        assert_eq!(parse.get("raw_response"), Some(&json!("just prose")));

        let provider = AnalysisResult::failure("API returned 500: boom");
        assert_eq!(provider.summary(), Some("AI analysis failed. See error for details."));
        assert_eq!(provider.get("recommendations"), Some(&json!([])));

        let invalid = AnalysisResult::from(AnalysisError::validation("Invalid JSON data", "{x"));
        assert!(invalid.is_error());
        assert_eq!(invalid.get("raw_text"), Some(&json!("{x")));
        assert!(invalid.summary().is_some());
    }

    #[test]
    fn test_pointer_lookup() {
        let result = AnalysisResult::from_map(
            json!({"summary": "s", "key_metrics": {"campaign_count": 3}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(result.pointer("/key_metrics/campaign_count"), Some(&json!(3)));
        assert_eq!(result.pointer("/summary"), Some(&json!("s")));
        assert!(result.pointer("/missing/x").is_none());
        assert!(result.pointer("summary").is_none());
    }

    #[test]
    fn test_pointer_decodes_escapes_in_first_segment() {
        let result = AnalysisResult::from_map(
            json!({"summary": "s", "a/b": {"c~d": 1}, "m~n": 2})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(result.pointer("/a~1b/c~0d"), Some(&json!(1)));
        assert_eq!(result.pointer("/m~0n"), Some(&json!(2)));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let result = AnalysisResult::failure("x");
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.is_object());
        assert_eq!(value["error"], "x");
    }
}

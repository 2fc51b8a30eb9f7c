//! Turns raw model replies into structured results
//!
//! Replies are tried against an ordered list of parse strategies; the first
//! one that yields a JSON object wins. Only objects count: a reply that parses
//! to an array or a bare string falls through to the next strategy.

use crate::result::AnalysisResult;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

type Strategy = fn(&str) -> Option<Map<String, Value>>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("brace_span", parse_brace_span),
    ("fenced", parse_fenced),
];

const FENCE_PATTERN: &str = r"(?s)```([A-Za-z0-9_-]*)[ \t]*\n?(.*?)```";

/// Parse a raw reply; never fails
pub fn normalize(raw: &str) -> AnalysisResult {
    for (name, strategy) in STRATEGIES {
        if let Some(map) = strategy(raw) {
            debug!(strategy = name, "Structured AI response");
            return AnalysisResult::from_reply(map, raw);
        }
    }

    warn!(chars = raw.len(), "Could not find JSON in AI response");
    AnalysisResult::parse_failure(raw)
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(text.trim()).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn parse_direct(raw: &str) -> Option<Map<String, Value>> {
    as_object(raw)
}

/// Greedy span from the first `{` to the last `}`
fn parse_brace_span(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    as_object(&raw[start..=end])
}

/// Fenced code blocks, `json`-labelled ones first
fn parse_fenced(raw: &str) -> Option<Map<String, Value>> {
    let re = Regex::new(FENCE_PATTERN).ok()?;
    let mut segments: Vec<(bool, &str)> = re
        .captures_iter(raw)
        .filter_map(|cap| {
            let labelled = cap.get(1)?.as_str().eq_ignore_ascii_case("json");
            Some((labelled, cap.get(2)?.as_str()))
        })
        .collect();
    // stable: keeps document order within each group
    segments.sort_by_key(|(labelled, _)| !labelled);

    segments.into_iter().find_map(|(_, body)| as_object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_json() {
        let result = normalize(r#"{"summary": "ok", "recommendations": [1, 2]}"#);
        assert_eq!(result.summary(), Some("ok"));
        assert_eq!(result.get("recommendations"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_fenced_json_after_prose() {
        let result = normalize("Sure! ```json\n{\"summary\":\"ok\"}\n```");
        assert_eq!(result.into_value(), json!({"summary": "ok"}));
    }

    #[test]
    fn test_json_embedded_in_prose() {
        let result = normalize("Here you go: {\"summary\": \"embedded\"} Hope that helps.");
        assert_eq!(result.summary(), Some("embedded"));
    }

    #[test]
    fn test_prefers_json_labelled_fence() {
        // The brace span covers both objects and fails, so fences decide
        let raw = "```text\n{\"summary\": \"plain\"}\n```\nand\n```json\n{\"summary\": \"labelled\"}\n```";
        assert_eq!(parse_fenced(raw).unwrap()["summary"], "labelled");
        assert_eq!(normalize(raw).summary(), Some("labelled"));
    }

    #[test]
    fn test_unlabelled_fence() {
        let raw = "``` \n{\"summary\": \"x\"}\n``` trailing } brace";
        assert_eq!(normalize(raw).summary(), Some("x"));
    }

    #[test]
    fn test_prose_is_parse_failure() {
        let raw = "I could not analyze this data.";
        let result = normalize(raw);
        assert!(result.is_error());
        assert_eq!(result.get("raw_response"), Some(&json!(raw)));
        assert!(result.summary().is_some());
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        let result = normalize("[1, 2, 3]");
        assert!(result.is_error());
    }

    #[test]
    fn test_object_without_summary_gets_placeholder() {
        let result = normalize(r#"{"key_insights": []}"#);
        assert_eq!(result.summary(), Some("No summary provided."));
    }
}

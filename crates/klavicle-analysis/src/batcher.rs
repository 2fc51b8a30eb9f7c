//! Token-budget batching and batch-result merging

use crate::result::{AnalysisResult, SUMMARY};
use serde_json::{Map, Value, json};

/// Default number of records per fixed-size chunk
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default token budget for a single prompt
pub const DEFAULT_MAX_TOKENS: usize = 100_000;

/// List-valued sections combined across batches; every other key is
/// batch-local and dropped from the merged result
pub const MERGEABLE_SECTIONS: [&str; 5] = [
    "key_insights",
    "strengths",
    "improvement_areas",
    "recommendations",
    "experiments",
];

const UNKNOWN_TYPE: &str = "unknown";

/// Where a batch came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSource {
    /// All records sharing one declared `type`
    Type(String),
    /// Fixed-size chunk, numbered from zero
    Chunk { index: usize },
}

impl BatchSource {
    pub fn label(&self) -> String {
        match self {
            Self::Type(name) => format!("type {name}"),
            Self::Chunk { index } => format!("chunk {}", index + 1),
        }
    }
}

/// Ordered sub-sequence of records
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub source: BatchSource,
    pub items: Vec<Value>,
}

/// Splits oversized payloads
#[derive(Debug, Clone)]
pub struct Batcher {
    batch_size: usize,
    max_tokens: usize,
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_MAX_TOKENS)
    }
}

impl Batcher {
    pub fn new(batch_size: usize, max_tokens: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_tokens,
        }
    }

    /// Rough token count: serialized characters / 4
    pub fn estimate_tokens(data: &Value) -> usize {
        let len = match data {
            Value::String(text) => text.len(),
            other => other.to_string().len(),
        };
        len / 4
    }

    pub fn needs_batching(&self, data: &Value) -> bool {
        Self::estimate_tokens(data) > self.max_tokens
    }

    /// Partition records
    ///
    /// Records are grouped by their `type` field when they are all objects and
    /// at least one declares a type; more than one group is returned as-is.
    /// Otherwise records are cut into fixed-size chunks in original order.
    pub fn make_batches(&self, items: &[Value]) -> Vec<Batch> {
        if let Some(groups) = group_by_type(items) {
            if groups.len() > 1 {
                return groups
                    .into_iter()
                    .map(|(name, items)| Batch {
                        source: BatchSource::Type(name),
                        items,
                    })
                    .collect();
            }
        }

        items
            .chunks(self.batch_size)
            .enumerate()
            .map(|(index, chunk)| Batch {
                source: BatchSource::Chunk { index },
                items: chunk.to_vec(),
            })
            .collect()
    }
}

/// Groups in first-appearance order
fn group_by_type(items: &[Value]) -> Option<Vec<(String, Vec<Value>)>> {
    if items.is_empty() || !items.iter().all(Value::is_object) {
        return None;
    }
    if !items.iter().any(|item| item.get("type").is_some()) {
        return None;
    }

    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
    for item in items {
        let name = match item.get("type") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => UNKNOWN_TYPE.to_string(),
            Some(other) => other.to_string(),
        };
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, members)) => members.push(item.clone()),
            None => groups.push((name, vec![item.clone()])),
        }
    }
    Some(groups)
}

/// Merge successful batch results
///
/// Mergeable sections are concatenated and deduplicated by structural
/// equality; summaries are joined. `batch_stats` records how many batches ran
/// and failed. Returns `None` when no batch succeeded.
pub fn merge_results(results: &[AnalysisResult], total_batches: usize) -> Option<AnalysisResult> {
    if results.is_empty() {
        return None;
    }

    let mut merged = Map::new();

    let summaries: Vec<&str> = results.iter().filter_map(AnalysisResult::summary).collect();
    let summary = if summaries.len() == 1 {
        summaries[0].to_string()
    } else {
        let mut text = format!("Combined analysis of {} batches:", results.len());
        for (i, part) in summaries.iter().enumerate() {
            text.push_str(&format!("\n\nBatch {}: {part}", i + 1));
        }
        text
    };
    merged.insert(SUMMARY.to_string(), Value::String(summary));

    for section in MERGEABLE_SECTIONS {
        let mut combined: Vec<Value> = Vec::new();
        for result in results {
            let Some(Value::Array(entries)) = result.get(section) else {
                continue;
            };
            for entry in entries {
                if !combined.contains(entry) {
                    combined.push(entry.clone());
                }
            }
        }
        if !combined.is_empty() {
            merged.insert(section.to_string(), Value::Array(combined));
        }
    }

    merged.insert(
        "batch_stats".to_string(),
        json!({
            "total": total_batches,
            "succeeded": results.len(),
            "failed": total_batches.saturating_sub(results.len()),
        }),
    );

    Some(AnalysisResult::from_map(merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(value: Value) -> AnalysisResult {
        AnalysisResult::from_map(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_needs_batching_threshold() {
        let batcher = Batcher::new(10, 5);
        // 20 chars -> 5 tokens, not over budget
        assert!(!batcher.needs_batching(&Value::String("a".repeat(20))));
        // 24 chars -> 6 tokens
        assert!(batcher.needs_batching(&Value::String("a".repeat(24))));
        // arrays are measured in compact form
        let items = json!(["aaaaaaaaaa", "bbbbbbbbbb"]);
        assert_eq!(Batcher::estimate_tokens(&items), items.to_string().len() / 4);
    }

    #[test]
    fn test_fixed_chunks_keep_order() {
        let items: Vec<Value> = (0..7).map(|i| json!({"id": i})).collect();
        let batches = Batcher::new(3, 10).make_batches(&items);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].source, BatchSource::Chunk { index: 0 });
        assert_eq!(batches[2].items, vec![json!({"id": 6})]);
        let flattened: Vec<Value> = batches.into_iter().flat_map(|b| b.items).collect();
        assert_eq!(flattened, items);
    }

    #[test]
    fn test_groups_by_declared_type() {
        let items = vec![
            json!({"id": 1, "type": "email"}),
            json!({"id": 2, "type": "sms"}),
            json!({"id": 3, "type": "email"}),
            json!({"id": 4}),
        ];
        let batches = Batcher::new(1, 10).make_batches(&items);

        let sources: Vec<_> = batches.iter().map(|b| b.source.clone()).collect();
        assert_eq!(
            sources,
            vec![
                BatchSource::Type("email".to_string()),
                BatchSource::Type("sms".to_string()),
                BatchSource::Type("unknown".to_string()),
            ]
        );
        assert_eq!(batches[0].items.len(), 2);
    }

    #[test]
    fn test_single_type_falls_back_to_chunks() {
        let items: Vec<Value> = (0..4).map(|i| json!({"id": i, "type": "email"})).collect();
        let batches = Batcher::new(2, 10).make_batches(&items);
        assert_eq!(batches.len(), 2);
        assert!(matches!(batches[1].source, BatchSource::Chunk { index: 1 }));
    }

    #[test]
    fn test_non_objects_are_chunked() {
        let items = vec![json!(1), json!({"type": "a"}), json!({"type": "b"})];
        let batches = Batcher::new(2, 10).make_batches(&items);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn test_partition_is_deterministic() {
        let items: Vec<Value> = (0..25).map(|i| json!({"id": i, "type": i % 3})).collect();
        let batcher = Batcher::new(4, 10);
        assert_eq!(batcher.make_batches(&items), batcher.make_batches(&items));
    }

    #[test]
    fn test_merge_deduplicates_sections() {
        let a = result(json!({
            "summary": "first",
            "recommendations": [{"area": "x"}, {"area": "y"}],
            "key_metrics": {"count": 1}
        }));
        let b = result(json!({
            "summary": "second",
            "recommendations": [{"area": "y"}, {"area": "z"}],
            "strengths": ["s"]
        }));

        let merged = merge_results(&[a, b], 3).unwrap();
        assert_eq!(
            merged.get("recommendations"),
            Some(&json!([{"area": "x"}, {"area": "y"}, {"area": "z"}]))
        );
        assert_eq!(merged.get("strengths"), Some(&json!(["s"])));
        assert!(merged.get("key_metrics").is_none());
        assert_eq!(
            merged.get("batch_stats"),
            Some(&json!({"total": 3, "succeeded": 2, "failed": 1}))
        );
        let summary = merged.summary().unwrap();
        assert!(summary.contains("Batch 1: first") && summary.contains("Batch 2: second"));
    }

    #[test]
    fn test_merge_of_nothing() {
        assert!(merge_results(&[], 3).is_none());
    }
}

//! File-backed result cache
//!
//! One JSON document per fingerprint, named `<entity_type>_<sha256>.json`, so a
//! single entity type can be cleared by file-name prefix. Entries expire after
//! the configured TTL and are deleted lazily when read. Storage failures are
//! logged and treated as misses; they never reach the caller.

use crate::entity::{AnalysisContext, DateRange, EntityType};
use crate::result::AnalysisResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{debug, warn};

/// Cache key: entity type plus a content fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub entity_type: EntityType,
    pub fingerprint: String,
}

impl CacheKey {
    /// Fingerprint the unfiltered payload together with the request options
    /// that change the result
    pub fn new(
        entity_type: EntityType,
        payload: &Value,
        context: Option<&AnalysisContext>,
        date_range: Option<&DateRange>,
    ) -> Self {
        let mut material = Map::new();
        material.insert(
            "entity_type".to_string(),
            Value::String(entity_type.as_str().to_string()),
        );
        material.insert("payload".to_string(), payload.clone());
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            material.insert("context".to_string(), context.to_value());
        }
        if let Some(range) = date_range {
            material.insert("date_range".to_string(), range.to_value());
        }

        Self {
            entity_type,
            fingerprint: compute_sha256(&canonical_json(&Value::Object(material))),
        }
    }

    fn file_name(&self) -> String {
        format!("{}_{}.json", self.entity_type.as_str(), self.fingerprint)
    }
}

/// On-disk document
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Creation time, seconds since the Unix epoch
    timestamp: f64,
    result: AnalysisResult,
}

/// Time-expiring result cache rooted at one directory
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the document for `key`
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Look up a live entry
    pub async fn get(&self, key: &CacheKey) -> Option<AnalysisResult> {
        let path = self.entry_path(key);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(entity_type = %key.entity_type, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache file");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&text) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt cache file");
                return None;
            }
        };

        let age = now_secs() - entry.timestamp;
        if age >= self.ttl.as_secs_f64() {
            debug!(path = %path.display(), age_secs = age, "Cache entry expired");
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete expired cache file");
            }
            return None;
        }

        debug!(entity_type = %key.entity_type, "Cache hit");
        Some(entry.result)
    }

    /// Store a result with the current time
    pub async fn set(&self, key: &CacheKey, result: &AnalysisResult) {
        self.set_at(key, result, now_secs()).await;
    }

    /// Store a result with an explicit creation time
    pub async fn set_at(&self, key: &CacheKey, result: &AnalysisResult, timestamp: f64) {
        let path = self.entry_path(key);
        let entry = CacheEntry {
            timestamp,
            result: result.clone(),
        };

        let write = async {
            fs::create_dir_all(&self.dir).await?;
            let text = serde_json::to_string(&entry)?;
            fs::write(&path, text).await?;
            Ok::<_, crate::AnalysisError>(())
        };

        match write.await {
            Ok(()) => debug!(path = %path.display(), "Cached analysis result"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write cache file"),
        }
    }

    /// Return the cached result or compute, store and return a fresh one
    ///
    /// `force_refresh` skips the lookup but still stores the fresh result.
    /// Error-shaped results are never stored.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        force_refresh: bool,
        compute: F,
    ) -> crate::Result<AnalysisResult>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = crate::Result<AnalysisResult>>,
    {
        if !force_refresh {
            if let Some(hit) = self.get(key).await {
                return Ok(hit);
            }
        }

        let result = compute().await?;
        if !result.is_error() {
            self.set(key, &result).await;
        }
        Ok(result)
    }

    /// Delete cached entries for one entity type, or all entries; returns how
    /// many files were removed
    pub async fn clear(&self, entity_type: Option<EntityType>) -> usize {
        let prefix = entity_type.map(|t| format!("{}_", t.as_str()));

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to read cache directory");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to list cache directory");
                    break;
                }
            };

            let name = entry.file_name();
            let name = name.to_string_lossy();
            let matches = name.ends_with(".json")
                && prefix.as_deref().is_none_or(|p| name.starts_with(p));
            if !matches {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(file = %name, error = %e, "Failed to delete cache file"),
            }
        }

        debug!(removed, entity_type = ?entity_type, "Cleared cache");
        removed
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// Compute the SHA-256 hex digest of a string
pub fn compute_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Compact JSON with object keys sorted at every level
fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                Value::Object(
                    keys.into_iter()
                        .map(|k| (k.clone(), sorted(&map[k])))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn result(summary: &str) -> AnalysisResult {
        AnalysisResult::from_map(json!({"summary": summary}).as_object().cloned().unwrap())
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a = CacheKey::new(EntityType::Lists, &json!([{"id": 1, "name": "a"}]), None, None);
        let b = CacheKey::new(EntityType::Lists, &json!([{"name": "a", "id": 1}]), None, None);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_fingerprint_covers_type_and_options() {
        let payload = json!([{"id": 1}]);
        let base = CacheKey::new(EntityType::Lists, &payload, None, None);

        let other_type = CacheKey::new(EntityType::Flows, &payload, None, None);
        assert_ne!(base.fingerprint, other_type.fingerprint);

        let context = AnalysisContext::new().with("focus", "growth");
        let with_context = CacheKey::new(EntityType::Lists, &payload, Some(&context), None);
        assert_ne!(base.fingerprint, with_context.fingerprint);

        let empty = AnalysisContext::new();
        let with_empty = CacheKey::new(EntityType::Lists, &payload, Some(&empty), None);
        assert_eq!(base.fingerprint, with_empty.fingerprint);

        let range = DateRange::new(Some("2024-01-01".to_string()), None);
        let with_range = CacheKey::new(EntityType::Lists, &payload, None, Some(&range));
        assert_ne!(base.fingerprint, with_range.fingerprint);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            compute_sha256("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), DAY);
        let key = CacheKey::new(EntityType::Campaigns, &json!([]), None, None);

        assert!(cache.get(&key).await.is_none());
        cache.set(&key, &result("cached")).await;
        assert_eq!(cache.get(&key).await, Some(result("cached")));

        let name = cache.entry_path(&key);
        let name = name.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("campaigns_"));
    }

    #[tokio::test]
    async fn test_get_or_compute() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), DAY);
        let key = CacheKey::new(EntityType::Lists, &json!([1]), None, None);

        let mut calls = 0;
        let first = cache
            .get_or_compute(&key, false, || {
                calls += 1;
                async { Ok(result("fresh")) }
            })
            .await
            .unwrap();
        assert_eq!(first.summary(), Some("fresh"));

        let second = cache
            .get_or_compute(&key, false, || {
                calls += 1;
                async { Ok(result("recomputed")) }
            })
            .await
            .unwrap();
        assert_eq!(second.summary(), Some("fresh"));
        assert_eq!(calls, 1);

        let forced = cache
            .get_or_compute(&key, true, || async { Ok(result("forced")) })
            .await
            .unwrap();
        assert_eq!(forced.summary(), Some("forced"));
        assert_eq!(cache.get(&key).await.unwrap().summary(), Some("forced"));
    }

    #[tokio::test]
    async fn test_error_results_are_not_stored() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), DAY);
        let key = CacheKey::new(EntityType::Flows, &json!([]), None, None);

        let failed = cache
            .get_or_compute(&key, false, || async { Ok(AnalysisResult::failure("boom")) })
            .await
            .unwrap();
        assert!(failed.is_error());
        assert!(!cache.entry_path(&key).exists());
    }

    #[tokio::test]
    async fn test_expired_entry_is_deleted() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), DAY);
        let key = CacheKey::new(EntityType::Flows, &json!([{"id": "f1"}]), None, None);

        let stale = now_secs() - DAY.as_secs_f64() - 60.0;
        cache.set_at(&key, &result("old"), stale).await;
        assert!(cache.entry_path(&key).exists());

        assert!(cache.get(&key).await.is_none());
        assert!(!cache.entry_path(&key).exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), DAY);
        let key = CacheKey::new(EntityType::Lists, &json!({}), None, None);

        std::fs::write(cache.entry_path(&key), "{not json").unwrap();
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_by_type_and_all() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), DAY);

        for (entity_type, n) in [(EntityType::Campaigns, 2), (EntityType::Flows, 1)] {
            for i in 0..n {
                let key = CacheKey::new(entity_type, &json!([i]), None, None);
                cache.set(&key, &result("x")).await;
            }
        }
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(cache.clear(Some(EntityType::Campaigns)).await, 2);
        assert_eq!(cache.clear(Some(EntityType::Campaigns)).await, 0);
        assert_eq!(cache.clear(None).await, 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_clear_missing_directory() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path().join("absent"), DAY);
        assert_eq!(cache.clear(None).await, 0);
    }
}

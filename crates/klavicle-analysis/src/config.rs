//! Configuration for analysis runs

use crate::batcher::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_TOKENS};
use crate::entity::DEFAULT_DATE_FIELD;
use crate::error::{AnalysisError, Result};
use crate::prompts::DEFAULT_PREVIEW_CHARS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CACHE_DIR: &str = ".klavicle/cache";

/// Configuration for analysis runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Records per fixed-size batch
    pub batch_size: usize,

    /// Token budget above which a payload is batched
    pub max_tokens: usize,

    /// Lifetime of cached results
    pub cache_ttl: Duration,

    /// Directory holding cached results
    pub cache_dir: PathBuf,

    /// Data characters embedded in an analysis prompt
    pub data_preview_chars: usize,

    /// Raw payload characters carried into the unified synthesis digest
    pub unified_preview_chars: usize,

    /// Batches analyzed at the same time
    pub batch_concurrency: usize,

    /// Record field used by date filtering when a range names none
    pub date_field: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_tokens: DEFAULT_MAX_TOKENS,
            cache_ttl: Duration::from_secs(24 * 60 * 60), // 24 hours
            cache_dir: default_cache_dir(),
            data_preview_chars: DEFAULT_PREVIEW_CHARS,
            unified_preview_chars: 2_000,
            batch_concurrency: 4,
            date_field: DEFAULT_DATE_FIELD.to_string(),
        }
    }
}

/// `~/.klavicle/cache`, or a relative `.klavicle/cache` without a home directory
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CACHE_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("max_tokens", self.max_tokens),
            ("data_preview_chars", self.data_preview_chars),
            ("batch_concurrency", self.batch_concurrency),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(AnalysisError::Config(format!(
                "{name} must be greater than 0"
            )));
        }

        if self.cache_ttl.is_zero() {
            return Err(AnalysisError::Config(
                "cache_ttl must be greater than 0".to_string(),
            ));
        }

        if self.date_field.is_empty() {
            return Err(AnalysisError::Config(
                "date_field cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    batch_size: Option<usize>,
    max_tokens: Option<usize>,
    cache_ttl: Option<Duration>,
    cache_dir: Option<PathBuf>,
    data_preview_chars: Option<usize>,
    unified_preview_chars: Option<usize>,
    batch_concurrency: Option<usize>,
    date_field: Option<String>,
}

impl AnalysisConfigBuilder {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn data_preview_chars(mut self, chars: usize) -> Self {
        self.data_preview_chars = Some(chars);
        self
    }

    pub fn unified_preview_chars(mut self, chars: usize) -> Self {
        self.unified_preview_chars = Some(chars);
        self
    }

    pub fn batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = Some(concurrency);
        self
    }

    pub fn date_field(mut self, field: impl Into<String>) -> Self {
        self.date_field = Some(field.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        let defaults = AnalysisConfig::default();

        let config = AnalysisConfig {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            data_preview_chars: self.data_preview_chars.unwrap_or(defaults.data_preview_chars),
            unified_preview_chars: self
                .unified_preview_chars
                .unwrap_or(defaults.unified_preview_chars),
            batch_concurrency: self.batch_concurrency.unwrap_or(defaults.batch_concurrency),
            date_field: self.date_field.unwrap_or(defaults.date_field),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_tokens, 100_000);
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.data_preview_chars, 10_000);
        assert_eq!(config.unified_preview_chars, 2_000);
        assert_eq!(config.date_field, "created");
        assert!(config.cache_dir.ends_with(".klavicle/cache"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = AnalysisConfig::builder()
            .batch_size(50)
            .max_tokens(2_000)
            .cache_dir("/tmp/klavicle-test")
            .build()
            .unwrap();

        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_tokens, 2_000);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/klavicle-test"));
    }

    #[test]
    fn test_validation_rejects_zero_sizes() {
        let err = AnalysisConfig::builder().batch_size(0).build().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: batch_size must be greater than 0");

        assert!(AnalysisConfig::builder().batch_concurrency(0).build().is_err());
        assert!(AnalysisConfig::builder().cache_ttl(Duration::ZERO).build().is_err());
        assert!(AnalysisConfig::builder().date_field("").build().is_err());
    }
}

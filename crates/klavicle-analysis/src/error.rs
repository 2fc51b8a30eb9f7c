//! Error types for analysis operations

use klavicle_llm::LLMError;
use klavicle_utils::ConfigError;
use thiserror::Error;

/// Analysis specific errors
///
/// None of these escape `analyze`/`refresh`; they are turned into an
/// error-shaped [`AnalysisResult`](crate::AnalysisResult) at that boundary.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Gateway call failed (network, timeout, non-success status)
    #[error("{0}")]
    Provider(#[from] LLMError),

    /// Caller input was malformed (payload JSON, date range)
    #[error("{message}")]
    Validation {
        message: String,
        /// Offending input, kept for debugging
        raw_text: String,
    },

    /// Prompt template failed to render
    #[error("Template error: {0}")]
    Template(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn validation(message: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            raw_text: raw_text.into(),
        }
    }
}

impl From<ConfigError> for AnalysisError {
    fn from(err: ConfigError) -> Self {
        AnalysisError::Config(err.to_string())
    }
}

impl From<minijinja::Error> for AnalysisError {
    fn from(err: minijinja::Error) -> Self {
        AnalysisError::Template(err.to_string())
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::validation("Invalid date: soon", "soon");
        assert_eq!(err.to_string(), "Invalid date: soon");

        let err: AnalysisError = LLMError::HttpStatus {
            status: 502,
            body: "bad gateway".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "API returned 502: bad gateway");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: AnalysisError = ConfigError::EmptyKey.into();
        assert!(matches!(err, AnalysisError::Config(msg) if msg == "Key cannot be empty"));
    }
}

//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while talking to an LLM backend
#[derive(Error, Debug)]
pub enum LLMError {
    /// The call did not finish within the gateway timeout
    #[error("Request to AI provider timed out after {0}s")]
    Timeout(u64),

    /// Backend answered with a non-success status
    #[error("API returned {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Network error
    #[error("Error querying AI provider: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Map a non-success status to the most specific variant
    pub fn from_status(status: u16, body: String, model: &str) -> Self {
        match status {
            401 => Self::AuthenticationFailed,
            429 => Self::RateLimitExceeded(body),
            400 => Self::InvalidRequest(body),
            404 => Self::ModelNotFound(model.to_string()),
            _ => Self::HttpStatus { status, body },
        }
    }

    /// Map a transport error, keeping timeouts distinct
    pub(crate) fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_secs)
        } else {
            Self::HttpError(err)
        }
    }

    /// Whether this failure was a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            LLMError::from_status(401, String::new(), "m"),
            LLMError::AuthenticationFailed
        ));
        assert!(matches!(
            LLMError::from_status(404, String::new(), "gpt-x"),
            LLMError::ModelNotFound(m) if m == "gpt-x"
        ));
        let err = LLMError::from_status(503, "overloaded".to_string(), "m");
        assert_eq!(err.to_string(), "API returned 503: overloaded");
    }

    #[test]
    fn test_timeout_display() {
        let err = LLMError::Timeout(60);
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Request to AI provider timed out after 60s");
    }
}

//! Error types for databonsai.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BonsaiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Batch shape mismatch: expected {expected} results, got {actual}")]
    BatchShapeMismatch { expected: usize, actual: usize },
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BonsaiError {
    /// Whether a provider call that failed with this error may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BonsaiError::Http(_) | BonsaiError::Provider(_) | BonsaiError::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for BonsaiError {
    fn from(error: serde_json::Error) -> Self {
        BonsaiError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<reqwest::Error> for BonsaiError {
    fn from(error: reqwest::Error) -> Self {
        BonsaiError::Http(error.to_string())
    }
}

impl From<crate::config::ConfigurationError> for BonsaiError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        BonsaiError::InvalidConfiguration(error.to_string())
    }
}

pub type BonsaiResult<T> = std::result::Result<T, BonsaiError>;

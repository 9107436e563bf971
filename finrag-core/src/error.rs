//! Error types for the finrag-core crate.
//!
//! `ProviderError` covers failures talking to the hosted collaborators (chat
//! completion, embeddings, reranking). `RagError` is the crate-level error that
//! pipeline operations return.

use thiserror::Error;

/// Errors from HTTP-backed model providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    /// The provider answered "too many requests" (HTTP 429).
    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{service} kept rate limiting after {attempts} attempts")]
    RateLimitExhausted { service: String, attempts: u32 },

    #[error("Datastore error: {0}")]
    Datastore(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Cannot compute metrics over an empty evaluation batch")]
    EmptyBatch,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl RagError {
    pub fn datastore(msg: impl Into<String>) -> Self {
        Self::Datastore(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result alias used throughout finrag-core.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_detection() {
        assert!(ProviderError::RateLimited { retry_after_secs: 3 }.is_rate_limited());
        assert!(
            !ProviderError::Connection {
                message: "reset".into()
            }
            .is_rate_limited()
        );
    }

    #[test]
    fn test_provider_error_converts() {
        let err: RagError = ProviderError::AuthFailed {
            provider: "cohere".into(),
        }
        .into();
        assert!(matches!(err, RagError::Provider(_)));
        assert_eq!(
            err.to_string(),
            "Provider error: Authentication failed for provider cohere"
        );
    }

    #[test]
    fn test_exhausted_message() {
        let err = RagError::RateLimitExhausted {
            service: "rerank".into(),
            attempts: 5,
        };
        assert_eq!(err.to_string(), "rerank kept rate limiting after 5 attempts");
    }
}

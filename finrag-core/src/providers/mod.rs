//! Model provider clients.
//!
//! Three narrow collaborator contracts are defined here:
//! - [`ChatModel`]: system + user message in, plain text out
//! - [`EmbeddingModel`]: texts in, one vector per text out
//! - [`RerankModel`]: query + candidate passages in, ranked indices out
//!
//! Hosted implementations talk to OpenAI-compatible and Cohere endpoints over
//! `reqwest`; `local` has offline stand-ins and `mock` has scripted ones for tests.
//! Use the `create_*` functions to build a provider from config.

pub mod cohere;
pub mod local;
pub mod mock;
pub mod openai;

use crate::config::{
    EmbeddingConfig, EmbeddingProviderKind, LlmConfig, RerankConfig, RerankProviderKind,
    RetryPolicy,
};
use crate::error::{ProviderError, RagError, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use cohere::CohereReranker;
pub use local::{HashingEmbeddings, PassthroughReranker};
pub use mock::{MockChatModel, MockEmbeddings, MockReranker};
pub use openai::{OpenAiChatModel, OpenAiEmbeddings};

/// Chat-completion service.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one system instruction and one user message, return the reply text.
    async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, ProviderError>;

    fn model_name(&self) -> &str;
}

/// Embedding service.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed every input; the output has one vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError>;

    fn model_name(&self) -> &str;
}

/// One reranked candidate: its position in the submitted list and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    pub index: usize,
    pub relevance_score: f32,
}

/// Reranking service.
#[async_trait]
pub trait RerankModel: Send + Sync {
    /// Rank `documents` against `query`, returning at most `top_n` hits in
    /// relevance order.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> std::result::Result<Vec<RerankHit>, ProviderError>;

    fn model_name(&self) -> &str;
}

/// Build the configured chat model.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    Ok(Arc::new(OpenAiChatModel::new(config)?))
}

/// Build the configured embedding model.
pub fn create_embedding_model(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingModel>> {
    match config.provider {
        EmbeddingProviderKind::OpenAi => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        EmbeddingProviderKind::Local => {
            if config.dimensions == 0 {
                return Err(RagError::config("embeddings.dimensions must be positive"));
            }
            Ok(Arc::new(HashingEmbeddings::new(config.dimensions)))
        }
    }
}

/// Build the configured reranker.
pub fn create_reranker(config: &RerankConfig) -> Result<Arc<dyn RerankModel>> {
    match config.provider {
        RerankProviderKind::Cohere => Ok(Arc::new(CohereReranker::new(config)?)),
        RerankProviderKind::None => Ok(Arc::new(PassthroughReranker)),
    }
}

/// Read an API key from the named environment variable.
pub fn resolve_api_key(api_key_env: &str, provider: &str) -> std::result::Result<String, ProviderError> {
    std::env::var(api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ProviderError::AuthFailed {
            provider: format!("{provider}: env var '{api_key_env}' not set"),
        })
}

/// POST a JSON body with bearer auth and decode the JSON reply.
pub(crate) async fn post_json(
    client: &Client,
    provider: &str,
    url: &str,
    api_key: &str,
    body: &Value,
) -> std::result::Result<Value, ProviderError> {
    debug!(provider, url, "Sending request");

    let response = client
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::Connection {
            message: format!("{provider} request failed: {e}"),
        })?;

    let status = response.status();
    let headers = response.headers().clone();
    let response_body = response.text().await.map_err(|e| ProviderError::ApiRequest {
        message: format!("Failed to read {provider} response body: {e}"),
    })?;

    if !status.is_success() {
        return Err(map_http_error(provider, status, &headers, &response_body));
    }

    serde_json::from_str(&response_body).map_err(|e| ProviderError::ResponseParse {
        message: format!("Invalid JSON from {provider}: {e}"),
    })
}

/// Map a non-success HTTP status onto a provider error.
pub fn map_http_error(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> ProviderError {
    match status.as_u16() {
        401 | 403 => {
            debug!(body = %body, "Authentication failed ({})", status);
            ProviderError::AuthFailed {
                provider: provider.to_string(),
            }
        }
        429 => ProviderError::RateLimited {
            retry_after_secs: parse_retry_after(headers).unwrap_or(5),
        },
        code if code >= 500 => ProviderError::ApiRequest {
            message: format!("{provider} server error ({status}): {body}"),
        },
        _ => ProviderError::ApiRequest {
            message: format!("{provider} HTTP {status}: {body}"),
        },
    }
}

/// Parse a `retry-after` header given in whole or fractional seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    value
        .trim_end_matches('s')
        .parse::<f64>()
        .ok()
        .map(|secs| secs.ceil() as u64)
}

/// Sleep for `ms` milliseconds; zero returns immediately.
pub(crate) async fn pause_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Run a rate-limited call under a fixed-delay retry policy.
///
/// Waits `warmup_delay_ms` once, then for each attempt waits
/// `pre_attempt_delay_ms` before calling `operation`. A rate-limited attempt n
/// is followed by a `backoff_base_ms * n` pause. Other errors return
/// immediately. When every attempt was rate limited the call fails with
/// [`RagError::RateLimitExhausted`].
pub async fn with_rate_limit_retry<F, Fut, T>(
    policy: &RetryPolicy,
    service: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ProviderError>>,
{
    pause_ms(policy.warmup_delay_ms).await;

    for attempt in 1..=policy.max_attempts {
        pause_ms(policy.pre_attempt_delay_ms).await;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() => {
                let backoff_ms = policy.backoff_ms(attempt);
                warn!(
                    service,
                    attempt,
                    max = policy.max_attempts,
                    backoff_ms,
                    "Rate limit reached, retrying"
                );
                pause_ms(backoff_ms).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(RagError::RateLimitExhausted {
        service: service.to_string(),
        attempts: policy.max_attempts,
    })
}

//! Retrieval: over-fetch from the datastore, then rerank.

use crate::config::{RerankConfig, RetryPolicy};
use crate::error::{ProviderError, RagError, Result};
use crate::providers::{RerankModel, with_rate_limit_retry};
use crate::rag::datastore::Datastore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Finds the passages most relevant to a query, best first.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>>;

    /// Passage count used when the caller doesn't choose one.
    fn default_top_k(&self) -> usize {
        10
    }
}

/// Retriever that fetches `overfetch_factor * top_k` candidates and lets a
/// rerank model pick and order the final `top_k`.
pub struct RerankingRetriever {
    datastore: Arc<dyn Datastore>,
    reranker: Arc<dyn RerankModel>,
    top_k: usize,
    overfetch_factor: usize,
    retry: RetryPolicy,
}

impl RerankingRetriever {
    pub fn new(datastore: Arc<dyn Datastore>, reranker: Arc<dyn RerankModel>) -> Self {
        let defaults = RerankConfig::default();
        Self {
            datastore,
            reranker,
            top_k: defaults.top_k,
            overfetch_factor: defaults.overfetch_factor,
            retry: defaults.retry,
        }
    }

    pub fn from_config(
        config: &RerankConfig,
        datastore: Arc<dyn Datastore>,
        reranker: Arc<dyn RerankModel>,
    ) -> Self {
        Self::new(datastore, reranker)
            .with_top_k(config.top_k)
            .with_overfetch_factor(config.overfetch_factor)
            .with_retry_policy(config.retry.clone())
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_overfetch_factor(mut self, factor: usize) -> Self {
        self.overfetch_factor = factor.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn rerank(&self, query: &str, candidates: Vec<String>, top_k: usize) -> Result<Vec<String>> {
        let hits = with_rate_limit_retry(&self.retry, "rerank", || {
            self.reranker.rerank(query, &candidates, top_k)
        })
        .await?;

        let indices: Vec<usize> = hits.iter().map(|h| h.index).collect();
        info!(?indices, model = self.reranker.model_name(), "Reranked indices");

        let mut slots: Vec<Option<String>> = candidates.into_iter().map(Some).collect();
        indices
            .into_iter()
            .map(|i| {
                slots.get_mut(i).and_then(Option::take).ok_or_else(|| {
                    RagError::from(ProviderError::ResponseParse {
                        message: format!("rerank returned invalid or repeated index {i}"),
                    })
                })
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for RerankingRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let fetch = top_k.saturating_mul(self.overfetch_factor);
        let candidates = self.datastore.search(query, fetch).await?;
        if candidates.is_empty() {
            info!("No candidates to rerank");
            return Ok(Vec::new());
        }
        self.rerank(query, candidates, top_k).await
    }

    fn default_top_k(&self) -> usize {
        self.top_k
    }
}

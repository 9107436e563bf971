//! Scripted providers for tests and dry runs.

use super::local::HashingEmbeddings;
use super::{ChatModel, EmbeddingModel, RerankHit, RerankModel};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Chat model that replays queued replies, then a fixed fallback reply.
pub struct MockChatModel {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::with_response("mock response")
    }

    /// A model that always answers `text`.
    pub fn with_response(text: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: text.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply for the next call.
    pub fn queue_reply(&self, reply: Result<String, ProviderError>) {
        lock(&self.replies).push_back(reply);
    }

    /// `(system, user)` pairs seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        lock(&self.calls).push((system.to_string(), user.to_string()));
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

/// Reranker that fails with queued errors first, then ranks by a fixed order.
pub struct MockReranker {
    order: Option<Vec<usize>>,
    failures: Mutex<VecDeque<ProviderError>>,
    always_fail: Option<ProviderError>,
    calls: AtomicUsize,
}

impl MockReranker {
    /// Keep candidate order.
    pub fn new() -> Self {
        Self {
            order: None,
            failures: Mutex::new(VecDeque::new()),
            always_fail: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Rank candidates in exactly this index order (out-of-range indices are skipped).
    pub fn with_order(order: Vec<usize>) -> Self {
        Self {
            order: Some(order),
            ..Self::new()
        }
    }

    /// Every call fails with "too many requests".
    pub fn always_rate_limited() -> Self {
        Self {
            always_fail: Some(ProviderError::RateLimited {
                retry_after_secs: 1,
            }),
            ..Self::new()
        }
    }

    /// Fail the next call with `err`.
    pub fn queue_failure(&self, err: ProviderError) {
        lock(&self.failures).push_back(err);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RerankModel for MockReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.always_fail {
            return Err(err.clone());
        }
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }
        let order: Vec<usize> = match &self.order {
            Some(order) => order
                .iter()
                .copied()
                .filter(|i| *i < documents.len())
                .collect(),
            None => (0..documents.len()).collect(),
        };
        let n = order.len().min(top_n);
        Ok(order
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(rank, index)| RerankHit {
                index,
                relevance_score: 1.0 - rank as f32 / n.max(1) as f32,
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "mock-rerank"
    }
}

/// Embedder with per-text overrides on top of feature hashing.
pub struct MockEmbeddings {
    inner: HashingEmbeddings,
    overrides: Mutex<HashMap<String, Vec<f32>>>,
    failure: Option<ProviderError>,
    calls: AtomicUsize,
}

impl MockEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: HashingEmbeddings::new(dimensions),
            overrides: Mutex::new(HashMap::new()),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with `err`.
    pub fn failing(err: ProviderError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new(8)
        }
    }

    /// Return `vector` whenever exactly `text` is embedded.
    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        lock(&self.overrides).insert(text.to_string(), vector);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddings {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let overrides = lock(&self.overrides);
        Ok(inputs
            .iter()
            .map(|t| {
                overrides
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| self.inner.embed_one(t))
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "mock-embeddings"
    }
}

//! Offline providers: no network, no API key.

use super::{EmbeddingModel, RerankHit, RerankModel};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Feature-hashing embedder.
///
/// Lower-cased alphanumeric terms are hashed into a fixed number of buckets
/// weighted by term frequency, then L2 normalized. Deterministic, so texts
/// sharing vocabulary land close together.
#[derive(Debug, Clone)]
pub struct HashingEmbeddings {
    dimensions: usize,
}

impl HashingEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            *tf.entry(word).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            vector[djb2(term) % self.dimensions] += *count as f32;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn djb2(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

#[async_trait]
impl EmbeddingModel for HashingEmbeddings {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_name(&self) -> &str {
        "local-hashing"
    }
}

/// Reranker that trusts the datastore's order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

#[async_trait]
impl RerankModel for PassthroughReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, ProviderError> {
        let n = documents.len().min(top_n);
        Ok((0..n)
            .map(|index| RerankHit {
                index,
                relevance_score: 1.0 - index as f32 / n.max(1) as f32,
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "passthrough"
    }
}

//! Answer correctness evaluation.
//!
//! [`SimilarityEvaluator`] first compares the response with the expected
//! answer literally. Only when that ratio falls short does it ask the
//! embedding model for a semantic comparison. Evaluation never fails: any
//! problem becomes an incorrect verdict whose reasoning names the error.

use crate::config::EvaluationConfig;
use crate::error::{RagError, Result};
use crate::providers::{EmbeddingModel, pause_ms};
use crate::similarity::{cosine_similarity, round3, text_similarity};
use crate::types::EvaluationResult;
use async_trait::async_trait;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reasoning suffix for a correct answer.
pub const CORRECT_VERDICT: &str =
    "✅ La respuesta coincide con la esperada o es semánticamente equivalente.";

/// Reasoning suffix for an incorrect answer.
pub const INCORRECT_VERDICT: &str = "❌ La respuesta no coincide ni semánticamente con la esperada.";

/// Judges whether a response answers a question correctly.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        question: &str,
        response: &str,
        expected_answer: &str,
    ) -> EvaluationResult;
}

/// Incorrect verdict carrying the error that prevented a judgement.
pub fn error_result(
    question: &str,
    response: &str,
    expected_answer: &str,
    error: impl Display,
) -> EvaluationResult {
    EvaluationResult {
        question: question.to_string(),
        response: response.to_string(),
        expected_answer: expected_answer.to_string(),
        is_correct: false,
        reasoning: format!("⚠️ Error en evaluación: {error}"),
    }
}

/// Literal ratio with an embedding-similarity fallback.
pub struct SimilarityEvaluator {
    embedder: Arc<dyn EmbeddingModel>,
    literal_threshold: f64,
    semantic_threshold: f64,
    semantic_delay_ms: u64,
}

impl SimilarityEvaluator {
    pub fn new(embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self::from_config(&EvaluationConfig::default(), embedder)
    }

    pub fn from_config(config: &EvaluationConfig, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            embedder,
            literal_threshold: config.literal_threshold,
            semantic_threshold: config.semantic_threshold,
            semantic_delay_ms: config.semantic_delay_ms,
        }
    }

    /// Pause before every embedding comparison.
    pub fn with_semantic_delay_ms(mut self, ms: u64) -> Self {
        self.semantic_delay_ms = ms;
        self
    }

    /// Literal similarity, rounded to three decimals.
    pub fn literal_similarity(&self, a: &str, b: &str) -> f64 {
        round3(text_similarity(a, b))
    }

    /// Cosine similarity of the two texts' embeddings, rounded to three
    /// decimals. Embedding failures are logged and score 0.0.
    pub async fn semantic_similarity(&self, a: &str, b: &str) -> f64 {
        pause_ms(self.semantic_delay_ms).await;
        match self.embed_pair(a, b).await {
            Ok((va, vb)) => round3(f64::from(cosine_similarity(&va, &vb))),
            Err(e) => {
                warn!(error = %e, "Semantic similarity failed, scoring 0");
                0.0
            }
        }
    }

    async fn embed_pair(&self, a: &str, b: &str) -> Result<(Vec<f32>, Vec<f32>)> {
        let mut vectors = self
            .embedder
            .embed(&[a.to_string(), b.to_string()])
            .await?
            .into_iter();
        match (vectors.next(), vectors.next()) {
            (Some(va), Some(vb)) => Ok((va, vb)),
            _ => Err(RagError::Evaluation(
                "embedding model returned fewer than two vectors".into(),
            )),
        }
    }
}

#[async_trait]
impl Evaluator for SimilarityEvaluator {
    async fn evaluate(
        &self,
        question: &str,
        response: &str,
        expected_answer: &str,
    ) -> EvaluationResult {
        let literal = self.literal_similarity(response, expected_answer);
        let mut is_correct = literal >= self.literal_threshold;
        let mut reasoning = format!("Similarity: {literal:.2}. ");

        if !is_correct {
            let semantic = self.semantic_similarity(response, expected_answer).await;
            reasoning.push_str(&format!("Semantic Similarity: {semantic:.2}. "));
            is_correct = semantic >= self.semantic_threshold;
            debug!(literal, semantic, is_correct, "Semantic check");
        }

        reasoning.push_str(if is_correct {
            CORRECT_VERDICT
        } else {
            INCORRECT_VERDICT
        });

        EvaluationResult {
            question: question.to_string(),
            response: response.to_string(),
            expected_answer: expected_answer.to_string(),
            is_correct,
            reasoning,
        }
    }
}

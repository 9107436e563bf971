//! # finrag-core
//!
//! Retrieval-augmented question answering over financial reports.
//!
//! A [`RagPipeline`] indexes documents into a [`Datastore`], retrieves
//! passages for a question (over-fetch, then rerank), asks a chat model for
//! an answer grounded in those passages and filters the answer through
//! [`ethical_guardrails`]. The same pipeline can evaluate itself against a
//! set of sample questions and write accuracy, groundedness and
//! hallucination metrics to disk.

pub mod config;
pub mod error;
pub mod eval;
pub mod persistence;
pub mod providers;
pub mod rag;
pub mod similarity;
pub mod types;

pub use config::{FinragConfig, RetryPolicy, load_config};
pub use error::{ProviderError, RagError, Result};
pub use eval::{Evaluator, LlmJudgeEvaluator, MetricsSummary, SimilarityEvaluator, compute_metrics};
pub use rag::{
    Datastore, EvaluationReport, Indexer, RagPipeline, ResponseGenerator, Retriever, ethical_guardrails,
    is_grounded_in_context,
};
pub use types::{Document, EvaluationResult, IndexedItem, SampleQuestion};

//! Answer evaluation and batch metrics.

pub mod evaluator;
pub mod llm_judge;
pub mod metrics;

pub use evaluator::{Evaluator, SimilarityEvaluator, error_result};
pub use llm_judge::LlmJudgeEvaluator;
pub use metrics::{MetricsSummary, compute_metrics, compute_metrics_with_threshold};

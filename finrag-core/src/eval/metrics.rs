//! Aggregate metrics over an evaluation batch.

use crate::error::{RagError, Result};
use crate::rag::grounding::{DEFAULT_GROUNDING_THRESHOLD, is_grounded_with_threshold};
use crate::similarity::round3;
use crate::types::EvaluationResult;
use serde::{Deserialize, Serialize};

/// Accuracy, groundedness and hallucination rate, each rounded to three
/// decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub accuracy: f64,
    pub groundedness: f64,
    pub hallucination_rate: f64,
}

pub fn compute_metrics(results: &[EvaluationResult]) -> Result<MetricsSummary> {
    compute_metrics_with_threshold(results, DEFAULT_GROUNDING_THRESHOLD)
}

/// A result is grounded when its response overlaps its own expected answer
/// by more than `threshold`. Every result is either grounded or
/// hallucinated, so the two rates always sum to one.
pub fn compute_metrics_with_threshold(
    results: &[EvaluationResult],
    threshold: f64,
) -> Result<MetricsSummary> {
    if results.is_empty() {
        return Err(RagError::EmptyBatch);
    }
    let total = results.len() as f64;
    let correct = results.iter().filter(|r| r.is_correct).count();
    let grounded = results
        .iter()
        .filter(|r| {
            is_grounded_with_threshold(
                &r.response,
                std::slice::from_ref(&r.expected_answer),
                threshold,
            )
        })
        .count();

    let groundedness = round3(grounded as f64 / total);
    Ok(MetricsSummary {
        accuracy: round3(correct as f64 / total),
        groundedness,
        // Derived from the rounded groundedness so ties can't push the sum past 1.
        hallucination_rate: round3(1.0 - groundedness),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(response: &str, expected: &str, is_correct: bool) -> EvaluationResult {
        EvaluationResult {
            question: "q".into(),
            response: response.into(),
            expected_answer: expected.into(),
            is_correct,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        assert!(matches!(compute_metrics(&[]), Err(RagError::EmptyBatch)));
    }

    #[test]
    fn test_counts_and_rounding() {
        let results = vec![
            result("USD 7.000 M", "USD 7.000 M", true),
            result("nada que ver", "USD 4.900 M", false),
            result("EBITDA de USD 4.900 M", "USD 4.900 M", false),
        ];
        assert_eq!(
            compute_metrics(&results).unwrap(),
            MetricsSummary {
                accuracy: 0.333,
                groundedness: 0.667,
                hallucination_rate: 0.333,
            }
        );
    }

    #[test]
    fn test_all_grounded() {
        let results = vec![result("a b", "a b", true), result("c", "c", true)];
        let m = compute_metrics(&results).unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.groundedness, 1.0);
        assert_eq!(m.hallucination_rate, 0.0);
    }

    #[test]
    fn test_serializes_field_names() {
        let m = MetricsSummary {
            accuracy: 0.5,
            groundedness: 0.25,
            hallucination_rate: 0.75,
        };
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["hallucination_rate"], 0.75);
        assert_eq!(json.as_object().unwrap().len(), 3);
    }
}

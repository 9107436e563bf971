//! Token-overlap groundedness heuristic.

use std::collections::HashSet;

/// Minimum overlap ratio for a response to count as grounded.
pub const DEFAULT_GROUNDING_THRESHOLD: f64 = 0.15;

/// Share of the response's distinct whitespace tokens that also occur in
/// the context, case-insensitively. The denominator is the number of
/// distinct response tokens, at least 1.
pub fn grounding_ratio(response: &str, context: &[String]) -> f64 {
    let response = response.to_lowercase();
    let context = context.join(" ").to_lowercase();

    let response_tokens: HashSet<&str> = response.split_whitespace().collect();
    let context_tokens: HashSet<&str> = context.split_whitespace().collect();

    let shared = response_tokens.intersection(&context_tokens).count();
    shared as f64 / response_tokens.len().max(1) as f64
}

/// Grounded iff the overlap ratio exceeds `threshold`.
pub fn is_grounded_with_threshold(response: &str, context: &[String], threshold: f64) -> bool {
    grounding_ratio(response, context) > threshold
}

pub fn is_grounded_in_context(response: &str, context: &[String]) -> bool {
    is_grounded_with_threshold(response, context, DEFAULT_GROUNDING_THRESHOLD)
}

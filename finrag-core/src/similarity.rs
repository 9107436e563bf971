//! Text and vector similarity scores.

use std::collections::HashMap;

/// Second texts at least this long stop seeding matches on popular characters.
const POPULAR_MIN_LEN: usize = 200;

/// Cosine similarity between two vectors. Mismatched lengths, empty input,
/// and zero vectors all score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Case-insensitive longest-matching-blocks ratio in `[0, 1]`.
///
/// `2 * matched / (len_a + len_b)`, where `matched` sums the blocks found by
/// repeatedly taking the longest common run of characters and recursing on
/// both sides of it. Once `b` has 200 or more characters, characters that
/// fill more than 1% of it no longer start a block (they can still extend
/// one). Two empty texts score 1.0.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = BlockMatcher::new(&a, &b).matched_len();
    2.0 * matched as f64 / total as f64
}

struct BlockMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each usable character in `b`, ascending.
    b_positions: HashMap<char, Vec<usize>>,
}

impl<'a> BlockMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b_positions: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b_positions.entry(c).or_default().push(j);
        }
        if b.len() >= POPULAR_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b_positions.retain(|_, positions| positions.len() <= limit);
        }
        Self { a, b, b_positions }
    }

    /// Longest block `(i, j, len)` inside `a[alo..ahi]` and `b[blo..bhi]`.
    /// Ties go to the earliest start in `a`, then in `b`.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
        // run length of the match ending at (i - 1, j), keyed by j
        let mut runs: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next_runs = HashMap::new();
            if let Some(positions) = self.b_positions.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| runs.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_runs.insert(j, k);
                    if k > best_len {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_len = k;
                    }
                }
            }
            runs = next_runs;
        }

        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_len += 1;
        }
        while best_i + best_len < ahi
            && best_j + best_len < bhi
            && self.a[best_i + best_len] == self.b[best_j + best_len]
        {
            best_len += 1;
        }
        (best_i, best_j, best_len)
    }

    fn matched_len(&self) -> usize {
        let mut matched = 0;
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                pending.push((i + k, ahi, j + k, bhi));
            }
        }
        matched
    }
}

/// Round to three decimal places, ties to even.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_text_similarity_ignores_case() {
        assert_eq!(
            text_similarity("EBITDA AJUSTADO: USD 4.900 M", "ebitda ajustado: usd 4.900 m"),
            1.0
        );
    }

    #[test]
    fn test_text_similarity_unrelated_is_low() {
        assert!(text_similarity("xyz", "abc") < 0.01);
        assert!(text_similarity("La deuda neta bajó", "qwkz 777") < 0.75);
    }

    #[test]
    fn test_text_similarity_partial() {
        let score = text_similarity("abcd", "abxx");
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_text_similarity_empty_inputs() {
        assert_eq!(text_similarity("", ""), 1.0);
        assert_eq!(text_similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_text_similarity_takes_longest_block_first() {
        // "ab" is matched first; the lone "c" before it can no longer pair up.
        assert!((text_similarity("cab", "abc") - 2.0 * 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_text_similarity_long_reordered_answers() {
        let a = "El EBITDA ajustado de 2023 alcanzó USD 4.900 millones y la deuda neta \
consolidada cerró en USD 7.000 millones. El ratio de apalancamiento neto se ubicó en 1,4 \
veces y las inversiones totalizaron USD 5.800 millones en el año.";
        let b = "La deuda neta consolidada cerró en USD 7.000 millones y el EBITDA ajustado \
de 2023 alcanzó USD 4.900 millones. Las inversiones totalizaron USD 5.800 millones en el \
año y el ratio de apalancamiento neto se ubicó en 1,4 veces.";
        assert!(b.chars().count() >= POPULAR_MIN_LEN);
        let score = round3(text_similarity(a, b));
        assert_eq!(score, 0.487);
        assert!(score < 0.75);
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.66666), 0.667);
        assert_eq!(round3(1.0 / 3.0), 0.333);
        assert_eq!(round3(0.0625), 0.062);
    }
}

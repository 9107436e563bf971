//! Document chunking strategies.
//!
//! Sizes and overlaps are counted in characters, never bytes, so accented
//! Spanish text never splits inside a code point.

use serde::{Deserialize, Serialize};

/// Chunking strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkingStrategy {
    FixedSize {
        chunk_size: usize,
        overlap: usize,
    },
    Sentence {
        max_sentences: usize,
        overlap_sentences: usize,
    },
    Recursive {
        separators: Vec<String>,
        chunk_size: usize,
        overlap: usize,
    },
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self::Recursive {
            separators: vec!["\n\n".into(), "\n".into(), ". ".into(), " ".into()],
            chunk_size: 512,
            overlap: 64,
        }
    }
}

/// Split `text` into non-empty, trimmed chunks.
pub fn chunk_text(text: &str, strategy: &ChunkingStrategy) -> Vec<String> {
    let chunks = match strategy {
        ChunkingStrategy::FixedSize {
            chunk_size,
            overlap,
        } => chunk_fixed(text, *chunk_size, *overlap),
        ChunkingStrategy::Sentence {
            max_sentences,
            overlap_sentences,
        } => chunk_sentence(text, *max_sentences, *overlap_sentences),
        ChunkingStrategy::Recursive {
            separators,
            chunk_size,
            overlap,
        } => chunk_recursive(text, separators, *chunk_size, *overlap),
    };
    chunks
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`.
fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    s.chars().skip(len.saturating_sub(n)).collect()
}

fn chunk_fixed(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end >= chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Split on the coarsest separator present, greedily merging pieces up to
/// `chunk_size`. Pieces that are still too long are split with the next
/// separator; when separators run out, fixed-size splitting takes over.
fn chunk_recursive(
    text: &str,
    separators: &[String],
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let Some(pos) = separators
        .iter()
        .position(|s| !s.is_empty() && text.contains(s.as_str()))
    else {
        return chunk_fixed(text, chunk_size, overlap);
    };
    let sep = separators[pos].as_str();
    let finer = &separators[pos + 1..];
    let sep_len = char_len(sep);

    let mut chunks = Vec::new();
    let mut current = String::new();
    // Whether `current` holds anything beyond carried-over overlap.
    let mut fresh = false;

    for part in text.split(sep) {
        if part.trim().is_empty() {
            continue;
        }
        let part_len = char_len(part);

        if part_len > chunk_size {
            if fresh {
                chunks.push(std::mem::take(&mut current));
            }
            current.clear();
            fresh = false;
            chunks.extend(chunk_recursive(part, finer, chunk_size, overlap));
            continue;
        }

        if fresh && char_len(&current) + sep_len + part_len > chunk_size {
            let carried = tail_chars(&current, overlap);
            chunks.push(std::mem::take(&mut current));
            fresh = false;
            if char_len(&carried) + sep_len + part_len <= chunk_size {
                current = carried;
            }
        }

        if !current.is_empty() {
            current.push_str(sep);
        }
        current.push_str(part);
        fresh = true;
    }

    if fresh {
        chunks.push(current);
    }
    chunks
}

/// Group sentences (split on ". ") into chunks of `max_sentences`, repeating
/// `overlap_sentences` at the start of the next chunk.
fn chunk_sentence(text: &str, max_sentences: usize, overlap_sentences: usize) -> Vec<String> {
    let max_sentences = max_sentences.max(1);
    let sentences: Vec<&str> = text
        .split(". ")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < sentences.len() {
        let end = (start + max_sentences).min(sentences.len());
        chunks.push(sentences[start..end].join(". "));
        if end >= sentences.len() {
            break;
        }
        start = end.saturating_sub(overlap_sentences).max(start + 1);
    }
    chunks
}

//! Data passed between pipeline stages.

use serde::{Deserialize, Serialize};

/// A source document supplied by the caller. The text is treated as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    /// Where the text came from (file path, URL), if known.
    #[serde(default)]
    pub source: Option<String>,
}

impl Document {
    /// Wrap raw text with a fresh random id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            source: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unit produced by an indexer and persisted by a datastore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedItem {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// A question paired with the answer the pipeline is expected to give.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleQuestion {
    pub question: String,
    pub answer: String,
}

impl SampleQuestion {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Verdict for one evaluated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub question: String,
    pub response: String,
    pub expected_answer: String,
    pub is_correct: bool,
    pub reasoning: String,
}

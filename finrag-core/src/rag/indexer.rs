//! Turning documents into storable items.

use crate::error::Result;
use crate::rag::chunk::{ChunkingStrategy, chunk_text};
use crate::types::{Document, IndexedItem};

/// Converts raw documents into items a [`Datastore`](crate::rag::Datastore) can persist.
pub trait Indexer: Send + Sync {
    fn index(&self, documents: &[Document]) -> Result<Vec<IndexedItem>>;
}

/// Indexer that splits each document with a [`ChunkingStrategy`].
#[derive(Debug, Clone, Default)]
pub struct ChunkingIndexer {
    strategy: ChunkingStrategy,
}

impl ChunkingIndexer {
    pub fn new(strategy: ChunkingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &ChunkingStrategy {
        &self.strategy
    }
}

impl Indexer for ChunkingIndexer {
    fn index(&self, documents: &[Document]) -> Result<Vec<IndexedItem>> {
        let mut items = Vec::new();
        for doc in documents {
            let chunks = chunk_text(&doc.text, &self.strategy);
            if chunks.is_empty() {
                tracing::debug!(document = %doc.id, "Document has no indexable text");
            }
            items.extend(
                chunks
                    .into_iter()
                    .enumerate()
                    .map(|(chunk_index, text)| IndexedItem {
                        id: format!("{}-chunk-{chunk_index}", doc.id),
                        document_id: doc.id.clone(),
                        chunk_index,
                        text,
                        source: doc.source.clone(),
                    }),
            );
        }
        Ok(items)
    }
}

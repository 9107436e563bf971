//! Retrieval-augmented generation: indexing, storage, retrieval, generation
//! and the pipeline that ties them together.

pub mod chunk;
pub mod datastore;
pub mod generator;
pub mod grounding;
pub mod guardrails;
pub mod indexer;
pub mod ingest;
pub mod pipeline;
pub mod retriever;

pub use chunk::{ChunkingStrategy, chunk_text};
pub use datastore::{Datastore, SqliteDatastore};
pub use generator::{LlmResponseGenerator, ResponseGenerator};
pub use grounding::{is_grounded_in_context, is_grounded_with_threshold};
pub use guardrails::ethical_guardrails;
pub use indexer::{ChunkingIndexer, Indexer};
pub use ingest::{load_documents, load_sample_questions};
pub use pipeline::{EvaluationReport, RagPipeline};
pub use retriever::{RerankingRetriever, Retriever};

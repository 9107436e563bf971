//! Vector datastore.
//!
//! [`Datastore`] is the storage contract the pipeline depends on.
//! [`SqliteDatastore`] keeps chunk text and embeddings in SQLite and answers
//! searches by brute-force cosine similarity, which is plenty for a few
//! thousand report chunks.

use crate::error::{RagError, Result};
use crate::providers::EmbeddingModel;
use crate::similarity::cosine_similarity;
use crate::types::IndexedItem;
use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Persists indexed items and finds the passages closest to a query.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Remove every stored item.
    async fn reset(&self) -> Result<()>;

    async fn add_items(&self, items: &[IndexedItem]) -> Result<()>;

    /// Up to `top_k` passage texts, most similar first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>>;

    /// Number of stored items.
    async fn count(&self) -> Result<usize>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    document_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    source      TEXT,
    text        TEXT NOT NULL,
    embedding   BLOB NOT NULL
);
";

/// SQLite-backed datastore.
pub struct SqliteDatastore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingModel>,
    batch_size: usize,
}

impl SqliteDatastore {
    /// Open (or create) a database file.
    pub fn open(path: &Path, embedder: Arc<dyn EmbeddingModel>) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?, embedder)
    }

    /// A datastore that lives only as long as this value.
    pub fn in_memory(embedder: Arc<dyn EmbeddingModel>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, embedder)
    }

    fn from_connection(conn: Connection, embedder: Arc<dyn EmbeddingModel>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            batch_size: 64,
        })
    }

    /// Texts per embedding request when adding items.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RagError::datastore("connection lock poisoned"))
    }

    fn insert_rows(&self, rows: &[(&IndexedItem, Vec<f32>)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO items (id, document_id, chunk_index, source, text, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    document_id = excluded.document_id,
                    chunk_index = excluded.chunk_index,
                    source = excluded.source,
                    text = excluded.text,
                    embedding = excluded.embedding",
            )?;
            for (item, embedding) in rows {
                stmt.execute(params![
                    item.id,
                    item.document_id,
                    item.chunk_index as i64,
                    item.source,
                    item.text,
                    encode_embedding(embedding),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_rows(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT text, embedding FROM items ORDER BY seq")?;
        let rows = stmt
            .query_map([], |row| {
                let text: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((text, decode_embedding(&blob)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn reset(&self) -> Result<()> {
        let removed = {
            let conn = self.lock()?;
            conn.execute("DELETE FROM items", [])?
        };
        info!(removed, "Datastore reset");
        Ok(())
    }

    async fn add_items(&self, items: &[IndexedItem]) -> Result<()> {
        let mut rows = Vec::with_capacity(items.len());
        for batch in items.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|i| i.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::datastore(format!(
                    "embedding model returned {} vectors for {} items",
                    vectors.len(),
                    batch.len()
                )));
            }
            rows.extend(batch.iter().zip(vectors));
        }
        self.insert_rows(&rows)?;
        debug!(count = items.len(), "Stored items");
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        if top_k == 0 || self.row_count()? == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::datastore("embedding model returned no query vector"))?;

        let mut scored: Vec<(f32, String)> = self
            .load_rows()?
            .into_iter()
            .map(|(text, vec)| (cosine_similarity(&query_vec, &vec), text))
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(top_k).map(|(_, text)| text).collect())
    }

    async fn count(&self) -> Result<usize> {
        self.row_count()
    }
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

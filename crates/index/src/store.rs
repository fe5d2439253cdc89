use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use saiborg_core::domain::chunk::{ChunkId, DocumentChunk};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store metadata missing; run a rebuild before writing chunks")]
    MissingMetadata,
    #[error("embedding has {actual} dimensions but the store is configured for {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
}

/// Writer/reader compatibility contract recorded at rebuild time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreMetadata {
    pub embedding_model: String,
    pub dimension: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// SQLite-backed vector store persisted at a configured filesystem path.
///
/// Chunks are immutable once written; the only mutation is a full rebuild
/// that replaces the previous generation. Search is brute-force cosine
/// similarity with a deterministic tie-break on chunk id.
#[derive(Clone)]
pub struct VectorStore {
    pool: SqlitePool,
}

impl VectorStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunk (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_source ON chunk(source)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn metadata(&self) -> Result<Option<StoreMetadata>, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM store_meta")
            .fetch_all(&self.pool)
            .await?;

        let mut embedding_model = None;
        let mut dimension = None;
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            match key.as_str() {
                "embedding_model" => embedding_model = Some(value),
                "dimension" => {
                    dimension = Some(value.parse::<usize>().map_err(|_| {
                        StoreError::Corrupt(format!("dimension metadata `{value}` is not a number"))
                    })?)
                }
                _ => {}
            }
        }

        match (embedding_model, dimension) {
            (Some(embedding_model), Some(dimension)) => {
                Ok(Some(StoreMetadata { embedding_model, dimension }))
            }
            (None, None) => Ok(None),
            _ => Err(StoreError::Corrupt("partial store metadata".to_string())),
        }
    }

    /// Drop the previous generation and record the new writer contract.
    /// Rerunning a rebuild with unchanged input therefore produces an
    /// equivalent store.
    pub async fn begin_rebuild(
        &self,
        embedding_model: &str,
        dimension: usize,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunk").execute(&mut *tx).await?;
        sqlx::query("INSERT OR REPLACE INTO store_meta (key, value) VALUES ('embedding_model', ?)")
            .bind(embedding_model)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT OR REPLACE INTO store_meta (key, value) VALUES ('dimension', ?)")
            .bind(dimension.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_chunk(
        &self,
        chunk: &DocumentChunk,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        let metadata = self.metadata().await?.ok_or(StoreError::MissingMetadata)?;
        if embedding.len() != metadata.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: metadata.dimension,
                actual: embedding.len(),
            });
        }

        sqlx::query(
            "INSERT OR REPLACE INTO chunk (id, source, page, seq, text, embedding)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id.0)
        .bind(&chunk.source)
        .bind(chunk.page as i64)
        .bind(chunk.seq as i64)
        .bind(&chunk.text)
        .bind(encode_embedding(embedding))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunk").fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    /// Nearest chunks by cosine similarity, best first; equal scores break
    /// ties by chunk id so repeated queries return identical orderings.
    pub async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let metadata = self.metadata().await?.ok_or(StoreError::MissingMetadata)?;
        if query.len() != metadata.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: metadata.dimension,
                actual: query.len(),
            });
        }

        let rows = sqlx::query("SELECT id, source, page, seq, text, embedding FROM chunk")
            .fetch_all(&self.pool)
            .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let source: String = row.try_get("source")?;
            let page: i64 = row.try_get("page")?;
            let seq: i64 = row.try_get("seq")?;
            let text: String = row.try_get("text")?;
            let blob: Vec<u8> = row.try_get("embedding")?;
            let embedding = decode_embedding(&blob)?;

            let score = cosine_similarity(query, &embedding);
            scored.push(ScoredChunk {
                chunk: DocumentChunk {
                    id: ChunkId(id),
                    source,
                    page: page as u32,
                    seq: seq as u32,
                    text,
                },
                score,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.0.cmp(&b.chunk.id.0))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::Corrupt(format!(
            "embedding blob of {} bytes is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

//! In-memory document store.
//!
//! Useful for testing and small fixtures.

use super::{
    cosine_similarity, rank, ChunkKey, DocumentStore, ScoredChunk, StoredChunk, Vocabulary,
};
use crate::embedding::Embedder;
use crate::error::{Result, SiftError};
use crate::query::FilterExpression;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument};

/// In-memory document store.
pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<HashMap<ChunkKey, StoredChunk>>,
}

impl MemoryVectorStore {
    /// Create an empty store that embeds search text with `embedder`.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ChunkKey, StoredChunk>>> {
        self.chunks
            .read()
            .map_err(|e| SiftError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ChunkKey, StoredChunk>>> {
        self.chunks
            .write()
            .map_err(|e| SiftError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl DocumentStore for MemoryVectorStore {
    #[instrument(skip(self, filter))]
    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
        filter: Option<&FilterExpression>,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text).await?;
        let matcher = filter.map(FilterExpression::compile).transpose()?;

        let chunks = self.read()?;
        let hits: Vec<ScoredChunk> = chunks
            .values()
            .filter(|stored| matcher.as_ref().map_or(true, |m| m.matches(&stored.chunk)))
            .map(|stored| ScoredChunk {
                chunk: stored.chunk.clone(),
                score: cosine_similarity(&query_embedding, &stored.embedding),
            })
            .collect();

        debug!("{} of {} chunks passed the filter", hits.len(), chunks.len());
        Ok(rank(hits, k))
    }

    async fn get_unique_metadata(&self, min_host_videos: usize) -> Result<Vocabulary> {
        let chunks = self.read()?;
        Ok(Vocabulary::from_metadata(
            chunks.values().map(|stored| &stored.chunk.metadata),
            min_host_videos,
        ))
    }

    async fn upsert_batch(&self, chunks: &[StoredChunk]) -> Result<usize> {
        let mut store = self.write()?;
        for stored in chunks {
            store.insert(stored.chunk.key(), stored.clone());
        }
        Ok(chunks.len())
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

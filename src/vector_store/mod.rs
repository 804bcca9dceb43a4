//! Document store abstraction for Sift.
//!
//! The pipeline only depends on [`DocumentStore`]: a filtered similarity search
//! over transcript chunks plus the metadata vocabulary the query parser needs.
//! Both bundled stores are brute-force adapters, not indexes.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use crate::query::FilterExpression;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Metadata attached to every transcript chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub video_id: String,
    pub title: String,
    pub show_name: String,
    /// Comma-separated host names, as stored.
    pub hosts: String,
    /// Publish time as UTC epoch seconds.
    pub published_at: i64,
    /// Offset of the chunk in the video, in seconds.
    pub start_time: f64,
}

impl ChunkMetadata {
    /// Individual host names.
    pub fn host_list(&self) -> impl Iterator<Item = &str> {
        self.hosts.split(',').map(str::trim).filter(|h| !h.is_empty())
    }
}

/// A single retrievable transcript passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(&self.metadata.video_id, self.metadata.start_time)
    }

    pub fn video_id(&self) -> &str {
        &self.metadata.video_id
    }

    /// Whole-second part of the start offset.
    pub fn start_seconds(&self) -> u64 {
        if self.metadata.start_time.is_finite() && self.metadata.start_time > 0.0 {
            self.metadata.start_time.trunc() as u64
        } else {
            0
        }
    }
}

/// Identity key of a chunk: `(video_id, start_time)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    video_id: String,
    start_bits: u64,
}

impl ChunkKey {
    pub fn new(video_id: &str, start_time: f64) -> Self {
        // -0.0 and 0.0 are the same offset
        let start_time = if start_time == 0.0 { 0.0 } else { start_time };
        Self {
            video_id: video_id.to_string(),
            start_bits: start_time.to_bits(),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn start_time(&self) -> f64 {
        f64::from_bits(self.start_bits)
    }
}

/// A search hit with its relevance score (higher is better).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// A chunk with its precomputed embedding, as held by the bundled stores.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// Known show and host names, used to ground the query parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Sorted distinct show names.
    pub show_names: Vec<String>,
    /// Sorted hosts that appear in at least the configured number of videos.
    pub hosts: Vec<String>,
}

impl Vocabulary {
    /// Build the vocabulary from chunk metadata rows.
    pub fn from_metadata<'a>(
        rows: impl IntoIterator<Item = &'a ChunkMetadata>,
        min_host_videos: usize,
    ) -> Self {
        let mut show_names = BTreeSet::new();
        let mut host_videos: HashMap<&str, HashSet<&str>> = HashMap::new();

        for meta in rows {
            if !meta.show_name.trim().is_empty() {
                show_names.insert(meta.show_name.trim().to_string());
            }
            for host in meta.host_list() {
                host_videos
                    .entry(host)
                    .or_default()
                    .insert(meta.video_id.as_str());
            }
        }

        let hosts: BTreeSet<String> = host_videos
            .into_iter()
            .filter(|(_, videos)| videos.len() >= min_host_videos)
            .map(|(host, _)| host.to_string())
            .collect();

        Self {
            show_names: show_names.into_iter().collect(),
            hosts: hosts.into_iter().collect(),
        }
    }
}

/// Trait for document store implementations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return up to `k` chunks matching `filter`, ranked by similarity to `text`.
    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
        filter: Option<&FilterExpression>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Distinct show names and frequent hosts.
    async fn get_unique_metadata(&self, min_host_videos: usize) -> Result<Vocabulary>;

    /// Insert or replace chunks, keyed by `(video_id, start_time)`.
    async fn upsert_batch(&self, chunks: &[StoredChunk]) -> Result<usize>;

    /// Total number of stored chunks.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort hits by descending score and keep the top `k`.
pub(crate) fn rank(mut hits: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_chunk_key_identity() {
        let a = chunk("abc", 10.5, 0, "one");
        let mut b = chunk("abc", 10.5, 99, "two");
        assert_eq!(a.key(), b.key());

        b.metadata.start_time = 10.0;
        assert_ne!(a.key(), b.key());
        assert_eq!(a.start_seconds(), 10);
        assert_eq!(ChunkKey::new("x", -0.0), ChunkKey::new("x", 0.0));
    }

    #[test]
    fn test_vocabulary_host_threshold() {
        let mut rows = Vec::new();
        for i in 0..5 {
            let mut c = chunk(&format!("v{}", i), 0.0, i, "text");
            c.metadata.hosts = "Greg Miller, Tim Gettys".to_string();
            rows.push(c.metadata);
        }
        // Same video twice does not count twice
        for start in [0.0, 30.0] {
            let mut c = chunk("v0", start, 0, "text");
            c.metadata.hosts = "Guest Star,".to_string();
            c.metadata.show_name = "Gamescast".to_string();
            rows.push(c.metadata);
        }

        let vocab = Vocabulary::from_metadata(&rows, 5);
        assert_eq!(vocab.hosts, vec!["Greg Miller", "Tim Gettys"]);
        assert_eq!(vocab.show_names, vec!["Gamescast", "Test Show"]);
    }
}

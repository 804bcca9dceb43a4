//! Topic fan-out retrieval with score-ranked merging under a context budget.

use crate::error::Result;
use crate::query::{FilterBuilder, FilterExpression};
use crate::vector_store::{ChunkKey, DocumentChunk, DocumentStore, ScoredChunk};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Runs the similarity searches for one retrieval plan.
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Retrieve at most `budget` unique chunks, returned in chronological order.
    ///
    /// With two or more topics, one search is issued per topic, each requiring
    /// that topic to appear in the chunk text or title. Searches run one after
    /// another; store failures propagate unchanged.
    #[instrument(skip(self, filter), fields(topics = topics.len()))]
    pub async fn retrieve(
        &self,
        query: &str,
        topics: &[String],
        filter: Option<&FilterExpression>,
        budget: usize,
    ) -> Result<Vec<DocumentChunk>> {
        if budget == 0 {
            return Ok(Vec::new());
        }

        let candidates = if topics.len() <= 1 {
            self.store.similarity_search(query, budget, filter).await?
        } else {
            let base = filter.and_then(FilterExpression::without_topic_groups);
            let mut candidates = Vec::new();

            for (i, topic) in topics.iter().enumerate() {
                let Some(topic_group) = FilterBuilder::topic_group(std::slice::from_ref(topic))
                else {
                    continue;
                };
                let topic_filter = match &base {
                    Some(base) => base.clone().and(topic_group),
                    None => FilterExpression::And(vec![topic_group]),
                };

                let others: Vec<&str> = topics
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, t)| t.as_str())
                    .collect();
                let text = search_text(query, &others);

                debug!("Gathering chunks for topic '{}' with search text '{}'", topic, text);
                let hits = self
                    .store
                    .similarity_search(&text, budget, Some(&topic_filter))
                    .await?;
                candidates.extend(hits);
            }
            candidates
        };

        let mut chunks = merge_ranked(candidates, budget);
        sort_chronologically(&mut chunks);

        info!("Retrieved {} chunks (budget {})", chunks.len(), budget);
        Ok(chunks)
    }
}

fn search_text(query: &str, other_topics: &[&str]) -> String {
    if other_topics.is_empty() {
        query.to_string()
    } else {
        other_topics.join(", ")
    }
}

/// Highest score first, one chunk per identity key, stopping once `budget` are kept.
pub fn merge_ranked(mut candidates: Vec<ScoredChunk>, budget: usize) -> Vec<DocumentChunk> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut seen: HashSet<ChunkKey> = HashSet::new();
    let mut kept = Vec::new();
    for candidate in candidates {
        if kept.len() >= budget {
            break;
        }
        if seen.insert(candidate.chunk.key()) {
            kept.push(candidate.chunk);
        }
    }
    kept
}

/// Order by `(published_at, video_id, start_time)`, ascending.
pub fn sort_chronologically(chunks: &mut [DocumentChunk]) {
    chunks.sort_by(|a, b| {
        a.metadata
            .published_at
            .cmp(&b.metadata.published_at)
            .then_with(|| a.metadata.video_id.cmp(&b.metadata.video_id))
            .then_with(|| a.metadata.start_time.total_cmp(&b.metadata.start_time))
    });
}

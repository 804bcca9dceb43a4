//! Scripted collaborators for unit tests.

use crate::embedding::Embedder;
use crate::error::{Result, SiftError};
use crate::query::FilterExpression;
use crate::vector_store::{
    ChunkMetadata, DocumentChunk, DocumentStore, ScoredChunk, StoredChunk, Vocabulary,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Build a chunk with the given identity and text; other metadata is filler.
pub fn chunk(video_id: &str, start_time: f64, published_at: i64, text: &str) -> DocumentChunk {
    DocumentChunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            video_id: video_id.to_string(),
            title: format!("Video {}", video_id),
            show_name: "Test Show".to_string(),
            hosts: String::new(),
            published_at,
            start_time,
        },
    }
}

pub fn scored(chunk: DocumentChunk, score: f32) -> ScoredChunk {
    ScoredChunk { chunk, score }
}

/// A model that replies from a script, repeating the last reply once exhausted.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail: bool,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A model whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::<String>::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl crate::llm::LanguageModel for ScriptedModel {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.fail {
            return Err(SiftError::Llm("scripted failure".to_string()));
        }

        let mut last = self.last.lock().unwrap();
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            *last = Some(reply);
        }
        Ok(last.clone().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// One recorded `similarity_search` call.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    pub text: String,
    pub k: usize,
    pub filter: Option<FilterExpression>,
}

/// A store that replays per-call search results and records every call.
pub struct ScriptedStore {
    vocabulary: Vocabulary,
    results: Mutex<VecDeque<Vec<ScoredChunk>>>,
    searches: Mutex<Vec<RecordedSearch>>,
}

impl ScriptedStore {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            results: Mutex::new(VecDeque::new()),
            searches: Mutex::new(Vec::new()),
        }
    }

    /// Queue the results of the next search call.
    pub fn then_return(self, hits: Vec<ScoredChunk>) -> Self {
        self.results.lock().unwrap().push_back(hits);
        self
    }

    pub fn searches(&self) -> Vec<RecordedSearch> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
        filter: Option<&FilterExpression>,
    ) -> Result<Vec<ScoredChunk>> {
        self.searches.lock().unwrap().push(RecordedSearch {
            text: text.to_string(),
            k,
            filter: filter.cloned(),
        });
        let mut hits = self.results.lock().unwrap().pop_front().unwrap_or_default();
        hits.truncate(k);
        Ok(hits)
    }

    async fn get_unique_metadata(&self, _min_host_videos: usize) -> Result<Vocabulary> {
        Ok(self.vocabulary.clone())
    }

    async fn upsert_batch(&self, chunks: &[StoredChunk]) -> Result<usize> {
        Ok(chunks.len())
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Embeds text as keyword occurrence counts, one dimension per keyword.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|k| text.matches(k.as_str()).count() as f32)
            .collect())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.keywords.len()
    }
}

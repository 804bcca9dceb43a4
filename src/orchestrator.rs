//! Pipeline orchestrator for Sift.
//!
//! Wires parsing, filtering, retrieval, answer generation and citation
//! extraction into a single question-to-answer call.

use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SiftError};
use crate::llm::{LanguageModel, OpenAIChatModel};
use crate::query::{FilterBuilder, FilterExpression, ParsedQuery, QueryParser};
use crate::rag::{
    format_context, render_console, render_markdown, AnswerGenerator, CitationExtractor,
    CitationMode, GeneratedAnswer, Retriever, StructuredSource, NO_DOCUMENTS_MESSAGE,
};
use crate::vector_store::{
    DocumentChunk, DocumentStore, MemoryVectorStore, SqliteVectorStore, Vocabulary,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Who the rendered answer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Plain text for a terminal.
    Console,
    /// One Markdown string for a UI.
    Ui,
}

/// The structured plan derived from a question.
#[derive(Debug, Clone)]
pub struct RetrievalPlan {
    pub parsed: ParsedQuery,
    pub filter: Option<FilterExpression>,
    /// The parser reply could not be understood; the search runs unfiltered.
    pub parse_failed: bool,
}

/// A generated answer with the sources it cites.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<StructuredSource>,
    /// Number of chunks handed to the answer model.
    pub context_chunks: usize,
    /// Whether the model followed the structured citation contract.
    pub structured: bool,
}

impl Answer {
    pub fn to_console(&self) -> String {
        render_console(&self.text, &self.sources)
    }

    pub fn to_markdown(&self) -> String {
        render_markdown(&self.text, &self.sources)
    }
}

/// The main orchestrator for the Sift pipeline.
pub struct Orchestrator {
    settings: Settings,
    store: Arc<dyn DocumentStore>,
    vocabulary: Vocabulary,
    parser: QueryParser,
    filter_builder: FilterBuilder,
    retriever: Retriever,
    generator: AnswerGenerator,
    citations: CitationExtractor,
}

impl Orchestrator {
    /// Create an orchestrator backed by OpenAI models and the configured store.
    pub async fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let parser_model: Arc<dyn LanguageModel> = Arc::new(OpenAIChatModel::parser(&settings.llm)?);
        let answer_model: Arc<dyn LanguageModel> =
            Arc::new(OpenAIChatModel::answerer(&settings.llm)?);
        let embedder: Arc<dyn Embedder> =
            Arc::new(OpenAIEmbedder::from_settings(&settings.embedding, &settings.llm)?);

        let store: Arc<dyn DocumentStore> = match settings.vector_store.provider.as_str() {
            "sqlite" => Arc::new(SqliteVectorStore::new(&settings.sqlite_path(), embedder)?),
            "memory" => Arc::new(MemoryVectorStore::new(embedder)),
            other => {
                return Err(SiftError::Config(format!(
                    "Unknown vector store provider '{}' (expected sqlite or memory)",
                    other
                )))
            }
        };

        Self::with_components(settings, prompts, store, parser_model, answer_model).await
    }

    /// Create an orchestrator with custom components.
    ///
    /// Loads the show/host vocabulary from the store once.
    pub async fn with_components(
        settings: Settings,
        prompts: Prompts,
        store: Arc<dyn DocumentStore>,
        parser_model: Arc<dyn LanguageModel>,
        answer_model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let vocabulary = store
            .get_unique_metadata(settings.retrieval.min_host_videos)
            .await?;
        info!(
            "Loaded vocabulary: {} shows, {} hosts",
            vocabulary.show_names.len(),
            vocabulary.hosts.len()
        );

        let parser = QueryParser::new(parser_model, prompts.clone(), &settings.parser);
        let filter_builder = FilterBuilder::new(settings.parser.corpus_start_year, parser.current_year());
        let citations = CitationExtractor::new(&settings.citations)?;

        Ok(Self {
            retriever: Retriever::new(store.clone()),
            generator: AnswerGenerator::new(answer_model, prompts),
            settings,
            store,
            vocabulary,
            parser,
            filter_builder,
            citations,
        })
    }

    /// Pin the year used for clamping and open-ended date bounds.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.parser = self.parser.with_current_year(year);
        self.filter_builder = FilterBuilder::new(self.settings.parser.corpus_start_year, year);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn citations(&self) -> &CitationExtractor {
        &self.citations
    }

    /// Parse the question and build its filter.
    #[instrument(skip(self))]
    pub async fn plan(&self, query: &str) -> Result<RetrievalPlan> {
        let (parsed, parse_failed) = match self.parser.parse(query, &self.vocabulary).await? {
            Some(parsed) => (parsed, false),
            None => {
                warn!("Query parsing failed; searching without filters");
                (ParsedQuery::default(), true)
            }
        };

        let filter = self.filter_builder.build(&parsed);
        info!(
            shows = parsed.shows.len(),
            hosts = parsed.hosts.len(),
            topics = parsed.topics.len(),
            date = ?parsed.date.map(|d| d.to_string()),
            "Planned retrieval"
        );

        Ok(RetrievalPlan {
            parsed,
            filter,
            parse_failed,
        })
    }

    /// Plan and retrieve with the configured context budget.
    pub async fn retrieve(&self, query: &str) -> Result<(RetrievalPlan, Vec<DocumentChunk>)> {
        self.retrieve_with_budget(query, self.settings.retrieval.context_budget)
            .await
    }

    /// Plan and retrieve at most `budget` chunks, in chronological order.
    pub async fn retrieve_with_budget(
        &self,
        query: &str,
        budget: usize,
    ) -> Result<(RetrievalPlan, Vec<DocumentChunk>)> {
        let plan = self.plan(query).await?;
        let chunks = self
            .retriever
            .retrieve(query, &plan.parsed.topics, plan.filter.as_ref(), budget)
            .await?;
        Ok((plan, chunks))
    }

    /// Answer a question. `None` means nothing was retrieved and no answer
    /// was generated.
    #[instrument(skip(self))]
    pub async fn answer(&self, query: &str) -> Result<Option<Answer>> {
        let start = Instant::now();

        let (plan, chunks) = self.retrieve(query).await?;
        if chunks.is_empty() {
            warn!("No documents found; skipping answer generation");
            return Ok(None);
        }

        let context = format_context(&chunks)?;
        let generated = self
            .generator
            .generate(query, &context, &plan.parsed.topics)
            .await?;

        let (sources, structured) = match &generated {
            GeneratedAnswer::Structured { citations, .. } => (
                self.citations.extract(CitationMode::Explicit(citations), &chunks),
                true,
            ),
            GeneratedAnswer::FreeText(text) => (
                self.citations.extract(CitationMode::AnswerText(text), &chunks),
                false,
            ),
        };
        if sources.is_empty() {
            warn!("Answer cites none of the {} retrieved chunks", chunks.len());
        }

        info!("Answered in {:.1}s", start.elapsed().as_secs_f64());

        Ok(Some(Answer {
            text: generated.text().to_string(),
            sources,
            context_chunks: chunks.len(),
            structured,
        }))
    }

    /// Answer a question and render it for `mode`.
    ///
    /// With nothing retrieved, UI callers get a fixed message and console
    /// callers get `None`.
    pub async fn process_query(&self, query: &str, mode: OutputMode) -> Result<Option<String>> {
        let answer = self.answer(query).await?;
        Ok(match (answer, mode) {
            (Some(answer), OutputMode::Console) => Some(answer.to_console()),
            (Some(answer), OutputMode::Ui) => Some(answer.to_markdown()),
            (None, OutputMode::Console) => None,
            (None, OutputMode::Ui) => Some(NO_DOCUMENTS_MESSAGE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::year_start;
    use crate::testing::{chunk, scored, ScriptedModel, ScriptedStore};

    const QUESTION: &str = "What did Greg say about Rocket League in 2021 on Gamescast?";

    fn vocabulary() -> Vocabulary {
        Vocabulary {
            show_names: vec!["Gamescast".to_string()],
            hosts: vec!["Greg Miller".to_string()],
        }
    }

    const PARSED_REPLY: &str = r#"{"shows": ["Gamescast"], "hosts": ["Greg Miller"], "topics": ["Rocket League"], "exact_year": "2021", "year_range": null, "before_year": null, "after_year": null}"#;

    async fn orchestrator(
        store: Arc<ScriptedStore>,
        parser_reply: &str,
        answer_model: Arc<ScriptedModel>,
    ) -> Orchestrator {
        Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            store,
            Arc::new(ScriptedModel::new([parser_reply])),
            answer_model,
        )
        .await
        .unwrap()
        .with_current_year(2025)
    }

    fn rocket_league_chunks() -> Vec<DocumentChunk> {
        let mut a = chunk("abc", 10.0, year_start(2021) + 100, "Rocket League is so good");
        let mut b = chunk("abc", 20.0, year_start(2021) + 100, "more Rocket League");
        for c in [&mut a, &mut b] {
            c.metadata.show_name = "Gamescast".to_string();
            c.metadata.hosts = "Greg Miller, Tim Gettys".to_string();
            c.metadata.title = "Gamescast 101".to_string();
        }
        vec![a, b]
    }

    #[tokio::test]
    async fn test_end_to_end_with_structured_citations() {
        let chunks = rocket_league_chunks();
        let store = Arc::new(
            ScriptedStore::new(vocabulary())
                .then_return(chunks.iter().cloned().map(|c| scored(c, 0.9)).collect()),
        );
        let answer_model = Arc::new(ScriptedModel::new([
            r#"{"query_response": "Greg loved it.", "sources": [{"video_id": "abc", "start_time": 10.0}]}"#,
        ]));
        let orchestrator = orchestrator(store.clone(), PARSED_REPLY, answer_model.clone()).await;

        let answer = orchestrator.answer(QUESTION).await.unwrap().unwrap();
        assert_eq!(answer.text, "Greg loved it.");
        assert!(answer.structured);
        assert_eq!(answer.context_chunks, 2);
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].references.len(), 1);
        assert_eq!(answer.sources[0].references[0].formatted, "0:10");

        let searches = store.searches();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].k, 100);
        let filter = searches[0].filter.as_ref().unwrap();
        assert_eq!(filter.groups().len(), 4);

        assert_eq!(answer_model.calls(), 1);
        let prompt = &answer_model.prompts()[0];
        assert!(prompt.contains("TRANSCRIPT #2 TEXT"));
        assert!(prompt.contains(QUESTION));
    }

    #[tokio::test]
    async fn test_no_documents_skips_generation() {
        let answer_model = Arc::new(ScriptedModel::new(["unused"]));
        let store = Arc::new(ScriptedStore::new(vocabulary()));
        let orchestrator = orchestrator(store, PARSED_REPLY, answer_model.clone()).await;

        let ui = orchestrator.process_query(QUESTION, OutputMode::Ui).await.unwrap();
        assert_eq!(ui.as_deref(), Some(NO_DOCUMENTS_MESSAGE));

        let console = orchestrator.process_query(QUESTION, OutputMode::Console).await.unwrap();
        assert!(console.is_none());

        assert_eq!(answer_model.calls(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_searches_unfiltered() {
        let store = Arc::new(ScriptedStore::new(vocabulary()));
        let orchestrator =
            orchestrator(store.clone(), "I can't help with that.", Arc::new(ScriptedModel::new(["x"]))).await;

        let (plan, chunks) = orchestrator.retrieve(QUESTION).await.unwrap();
        assert!(plan.parse_failed);
        assert!(plan.filter.is_none());
        assert!(chunks.is_empty());

        let searches = store.searches();
        assert_eq!(searches[0].text, QUESTION);
        assert!(searches[0].filter.is_none());
    }

    #[tokio::test]
    async fn test_free_text_answer_uses_text_citations() {
        let store = Arc::new(
            ScriptedStore::new(vocabulary())
                .then_return(rocket_league_chunks().into_iter().map(|c| scored(c, 0.5)).collect()),
        );
        let answer_model = Arc::new(ScriptedModel::new(["Greg talks about it in abc at 20 seconds."]));
        let orchestrator = orchestrator(store, PARSED_REPLY, answer_model).await;

        let markdown = orchestrator
            .process_query(QUESTION, OutputMode::Ui)
            .await
            .unwrap()
            .unwrap();
        assert!(markdown.starts_with("Greg talks about it in abc at 20 seconds."));
        assert!(markdown.contains("**Gamescast 101**"));
        assert!(markdown.contains("[0:20](https://www.youtube.com/watch?v=abc&t=20s)"));
        assert!(!markdown.contains("[0:10]"));
    }

    #[tokio::test]
    async fn test_answer_model_failure_propagates() {
        let store = Arc::new(
            ScriptedStore::new(vocabulary())
                .then_return(rocket_league_chunks().into_iter().map(|c| scored(c, 0.5)).collect()),
        );
        let orchestrator = orchestrator(store, PARSED_REPLY, Arc::new(ScriptedModel::failing())).await;
        assert!(orchestrator.answer(QUESTION).await.is_err());
    }

    #[tokio::test]
    async fn test_vocabulary_loaded_at_construction() {
        let store = Arc::new(ScriptedStore::new(vocabulary()));
        let orchestrator = orchestrator(store, PARSED_REPLY, Arc::new(ScriptedModel::new(["x"]))).await;
        assert_eq!(orchestrator.vocabulary(), &vocabulary());
    }
}

//! Answer generation over a formatted context block.

use crate::config::Prompts;
use crate::error::Result;
use crate::llm::{clean_response, LanguageModel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A `(video_id, start_time)` pair the model says it relied on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub video_id: String,
    pub start_time: f64,
}

#[derive(Debug, Deserialize)]
struct StructuredReply {
    query_response: String,
    #[serde(default)]
    sources: Vec<SourceCitation>,
}

/// What the model produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedAnswer {
    /// The reply followed the JSON contract.
    Structured {
        text: String,
        citations: Vec<SourceCitation>,
    },
    /// Anything else; the reply is used as the answer verbatim.
    FreeText(String),
}

impl GeneratedAnswer {
    pub fn text(&self) -> &str {
        match self {
            GeneratedAnswer::Structured { text, .. } => text,
            GeneratedAnswer::FreeText(text) => text,
        }
    }
}

/// Parse a raw model reply.
pub fn parse_answer(reply: &str) -> GeneratedAnswer {
    let cleaned = clean_response(reply);
    match serde_json::from_str::<StructuredReply>(&cleaned) {
        Ok(parsed) => GeneratedAnswer::Structured {
            text: parsed.query_response,
            citations: parsed.sources,
        },
        Err(e) => {
            warn!("Answer is not structured JSON ({}); falling back to text citations", e);
            GeneratedAnswer::FreeText(reply.trim().to_string())
        }
    }
}

/// Drives the answer model.
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    prompts: Prompts,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Prompts) -> Self {
        Self { model, prompts }
    }

    #[instrument(skip(self, context), fields(model = self.model.name()))]
    pub async fn generate(&self, query: &str, context: &str, topics: &[String]) -> Result<GeneratedAnswer> {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        vars.insert("context".to_string(), context.to_string());
        vars.insert("topics".to_string(), topics.join(", "));

        let prompt = self.prompts.render_with_custom(&self.prompts.answer.template, &vars);
        let reply = self.model.invoke(&prompt).await?;

        let answer = parse_answer(&reply);
        if let GeneratedAnswer::Structured { citations, .. } = &answer {
            debug!("Model cited {} sources", citations.len());
        }
        Ok(answer)
    }
}

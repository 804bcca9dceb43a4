//! Text model abstraction used for query parsing and answer generation.

mod openai;

pub use openai::OpenAIChatModel;

use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

/// A stateless prompt-in, text-out model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a prompt and return the model's reply text.
    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Model name, for logging.
    fn name(&self) -> &str;
}

/// Strip reasoning blocks and Markdown code fences from a model reply.
///
/// Reasoning models emit `<think>...</think>` before the answer, and most
/// models wrap JSON in a ```json fence even when told not to.
pub fn clean_response(raw: &str) -> String {
    static THINK: OnceLock<Regex> = OnceLock::new();
    static FENCE: OnceLock<Regex> = OnceLock::new();

    let think = THINK.get_or_init(|| {
        Regex::new(r"(?s)<think>.*?</think>").expect("static regex")
    });
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("static regex")
    });

    let stripped = think.replace_all(raw, "");
    let trimmed = stripped.trim();
    match fence.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    }
}

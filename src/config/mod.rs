//! Configuration module for Sift.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, ParserPrompts, Prompts};
pub use settings::{
    CitationSettings, EmbeddingSettings, GeneralSettings, LlmSettings, ParserSettings,
    PromptSettings, RetrievalSettings, Settings, VectorStoreSettings,
};

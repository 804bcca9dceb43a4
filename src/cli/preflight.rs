//! Pre-flight checks before model calls.
//!
//! Validates configuration up front so a missing key fails before any
//! store is opened or request is sent.

use crate::config::LlmSettings;
use crate::error::{Result, SiftError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering questions calls the parsing and answer models.
    Ask,
    /// Search parses the question and embeds it.
    Search,
    /// Listing the vocabulary only reads the store.
    Vocab,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, llm: &LlmSettings) -> Result<()> {
    match operation {
        Operation::Ask | Operation::Search => check_api_key(llm),
        Operation::Vocab => Ok(()),
    }
}

/// A local OpenAI-compatible server needs no key.
fn check_api_key(llm: &LlmSettings) -> Result<()> {
    if llm.is_local() {
        return Ok(());
    }
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SiftError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(SiftError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...', or point llm.api_base at a local server".to_string(),
        )),
    }
}

//! Ask command implementation.

use super::start;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, OutputMode};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, settings: Settings) -> Result<()> {
    let orchestrator = start(Operation::Ask, settings).await?;
    answer_and_print(&orchestrator, question).await
}

/// Answer one question and print it in console form.
pub(super) async fn answer_and_print(orchestrator: &Orchestrator, question: &str) -> Result<()> {
    let spinner = Output::spinner("Thinking...");
    let result = orchestrator.process_query(question, OutputMode::Console).await;
    spinner.finish_and_clear();

    match result {
        Ok(Some(text)) => {
            println!("\n{}", text);
            Ok(())
        }
        Ok(None) => {
            Output::warning("No documents found, skipping this question.");
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to answer: {}", e));
            Err(e.into())
        }
    }
}

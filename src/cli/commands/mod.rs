//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod search;
mod serve;
mod vocab;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use search::run_search;
pub use serve::run_serve;
pub use vocab::run_vocab;

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;

/// Run pre-flight checks, then build the orchestrator behind a spinner.
async fn start(operation: Operation, settings: Settings) -> anyhow::Result<Orchestrator> {
    if let Err(e) = preflight::check(operation, &settings.llm) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let spinner = Output::spinner("Loading archive vocabulary...");
    let orchestrator = Orchestrator::new(settings).await;
    spinner.finish_and_clear();

    Ok(orchestrator?)
}

//! Search command implementation.

use super::start;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::format_timestamp;
use anyhow::Result;
use chrono::DateTime;

/// Run the search command.
pub async fn run_search(query: &str, limit: Option<usize>, settings: Settings) -> Result<()> {
    let budget = limit.unwrap_or(settings.retrieval.context_budget);
    let orchestrator = start(Operation::Search, settings).await?;

    let spinner = Output::spinner("Searching...");
    let result = orchestrator.retrieve_with_budget(query, budget).await;
    spinner.finish_and_clear();

    let (plan, chunks) = match result {
        Ok(found) => found,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    Output::header("Retrieval plan");
    if plan.parse_failed {
        Output::warning("Could not parse the question; searched without filters.");
    }
    Output::kv("Shows", &join(&plan.parsed.shows));
    Output::kv("Hosts", &join(&plan.parsed.hosts));
    Output::kv("Topics", &join(&plan.parsed.topics));
    Output::kv(
        "Date",
        &plan.parsed.date.map(|d| d.to_string()).unwrap_or_default(),
    );
    if let Some(filter) = &plan.filter {
        Output::kv("Filter", &filter.to_json().to_string());
    }

    if chunks.is_empty() {
        Output::warning("No passages found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} passages", chunks.len()));
    for chunk in &chunks {
        let meta = &chunk.metadata;
        let published = DateTime::from_timestamp(meta.published_at, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let url = orchestrator
            .citations()
            .deep_link(&meta.video_id, chunk.start_seconds());
        Output::passage(
            &meta.title,
            &meta.show_name,
            &published,
            &format_timestamp(chunk.start_seconds()),
            &chunk.text,
            &url,
        );
    }

    Ok(())
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

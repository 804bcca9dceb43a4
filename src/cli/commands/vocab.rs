//! Vocab command implementation.

use super::start;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Print the show and host names loaded from the store.
pub async fn run_vocab(settings: Settings) -> Result<()> {
    let min_host_videos = settings.retrieval.min_host_videos;
    let orchestrator = start(Operation::Vocab, settings).await?;
    let vocabulary = orchestrator.vocabulary();

    if vocabulary.show_names.is_empty() && vocabulary.hosts.is_empty() {
        Output::info("The document store is empty.");
        return Ok(());
    }

    Output::header(&format!("Shows ({})", vocabulary.show_names.len()));
    for show in &vocabulary.show_names {
        Output::list_item(show);
    }

    Output::header(&format!(
        "Hosts in at least {} videos ({})",
        min_host_videos,
        vocabulary.hosts.len()
    ));
    for host in &vocabulary.hosts {
        Output::list_item(host);
    }

    println!();
    Output::kv("Chunks", &orchestrator.store().chunk_count().await?.to_string());
    Ok(())
}

//! Sift - question answering over a video transcript archive
//!
//! Sift answers natural-language questions about a large archive of video
//! transcripts and cites the exact moments in the videos that support the
//! answer.
//!
//! # Overview
//!
//! A question goes through a fixed pipeline:
//! - `query` parses it with a language model into shows, hosts, a date
//!   constraint and topics, then builds a metadata filter from them
//! - `rag` retrieves chunks per topic, merges them under a budget, formats the
//!   context and asks the answer model for a cited reply
//! - `rag` also maps the cited `(video_id, start_time)` pairs back to
//!   timestamped deep links, rendered for a console or as Markdown
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `llm` - Chat model abstraction
//! - `embedding` - Embedding generation
//! - `vector_store` - Document store abstraction and bundled stores
//! - `query` - Query parsing and filter construction
//! - `rag` - Retrieval, answer generation and citations
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use sift::config::Settings;
//! use sift::orchestrator::{Orchestrator, OutputMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings).await?;
//!
//!     let question = "What did Greg say about Rocket League in 2016?";
//!     match orchestrator.process_query(question, OutputMode::Console).await? {
//!         Some(answer) => println!("{}", answer),
//!         None => println!("No documents found."),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod query;
pub mod rag;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{Result, SiftError};

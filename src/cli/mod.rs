//! CLI module for Sift.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Sift - question answering over a video transcript archive
///
/// Parses a question into show, host, date and topic filters, retrieves the
/// matching transcript passages and answers with timestamped sources.
#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question and get an answer with sources
    Ask {
        /// The question to ask
        question: String,
    },

    /// Start an interactive question loop
    Chat,

    /// Show the passages a question would retrieve, without answering it
    Search {
        /// Search query
        query: String,

        /// Maximum number of passages (defaults to retrieval.context_budget)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List the show and host names the parser knows about
    Vocab,

    /// Start HTTP API server for UI callers
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "retrieval.context_budget")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_with_limit() {
        let cli = Cli::try_parse_from(["sift", "-vv", "search", "rocket league", "--limit", "7"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search { query, limit } => {
                assert_eq!(query, "rocket league");
                assert_eq!(limit, Some(7));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["sift", "config", "set", "retrieval.context_budget", "20"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config { action: ConfigAction::Set { ref key, ref value } }
                if key == "retrieval.context_budget" && value == "20"
        ));
    }
}

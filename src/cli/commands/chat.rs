//! Interactive question loop.
//!
//! Every line is answered independently; there is no conversation memory.

use super::ask::answer_and_print;
use super::start;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> Result<()> {
    let orchestrator = start(Operation::Ask, settings).await?;

    println!("\n{}", style("Sift").bold().cyan());
    println!("{}\n", style("Ask a question, or type 'exit' to quit.").dim());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("Question:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        // One failed question should not end the session
        if answer_and_print(&orchestrator, input).await.is_err() {
            continue;
        }
        println!();
    }

    Ok(())
}

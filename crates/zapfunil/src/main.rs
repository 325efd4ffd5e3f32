// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zapfunil - WhatsApp sales pipeline engine for venue businesses.
//!
//! This is the binary entry point: webhook server, follow-up tick loop,
//! and the operational subcommands.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod serve;
mod status;

/// Zapfunil - WhatsApp sales pipeline engine.
#[derive(Parser, Debug)]
#[command(name = "zapfunil", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server and follow-up scheduler.
    Serve,
    /// Print pipeline counters.
    Status,
    /// List duplicate conversation groups.
    DetectDuplicates,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match zapfunil_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            zapfunil_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run(config).await,
        Some(Commands::Status) => status::run(&config).await,
        Some(Commands::DetectDuplicates) => status::run_detect_duplicates(&config).await,
        None => {
            println!("zapfunil: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("zapfunil: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        super::Cli::command().debug_assert();
    }
}

//! Unsub CLI - subscription finder
//!
//! Usage:
//!   unsub analyze statement.csv      Analyze a statement locally
//!   unsub analyze statement.pdf --json
//!   unsub serve --port 3000          Start the web server

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Analyze {
            file,
            format,
            json,
            no_validate,
        } => commands::cmd_analyze(&file, format, json, no_validate).await,
        Commands::Serve { port, host } => commands::cmd_serve(&host, port).await,
    }
}

//! CLI argument definitions using clap
//!
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Unsub - Find the subscriptions hiding in your bank statements
#[derive(Parser)]
#[command(name = "unsub")]
#[command(about = "Detect recurring subscriptions in bank statements", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Input format for the analyze command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Pick by file extension
    Auto,
    Csv,
    Pdf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a bank statement for subscriptions
    Analyze {
        /// Statement file (CSV export or PDF)
        file: PathBuf,

        /// Input format
        #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
        format: InputFormat,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Skip the external validator, use local statistics only
        #[arg(long)]
        no_validate: bool,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

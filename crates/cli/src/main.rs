//! TillSync CLI - Database migrations and sync inspection.
//!
//! # Usage
//!
//! ```bash
//! # Run bridge database migrations
//! tillsync-cli migrate
//!
//! # Show credential, history, and queue status
//! tillsync-cli status
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tillsync-cli")]
#[command(author, version, about = "TillSync CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run bridge database migrations
    Migrate,
    /// Show credential, audit log, and retry queue status
    Status,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Status => commands::status::run().await,
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

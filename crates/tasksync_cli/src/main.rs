//! tasksync CLI
//!
//! Operator tools for a local tasksync store.
//!
//! # Commands
//!
//! - `status` - Show queue items grouped by status
//! - `retry` - Move a failed queue item back to pending
//! - `discard` - Delete a queue item
//! - `tasks` / `lists` - Show local tasks and task lists
//! - `purge-tombstones` - Remove old tombstoned entities

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tasksync store maintenance tools.
#[derive(Parser)]
#[command(name = "tasksync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show queue items grouped by status
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Move a failed queue item back to pending
    Retry {
        /// Queue item id
        id: u64,
    },

    /// Delete a queue item
    Discard {
        /// Queue item id
        id: u64,
    },

    /// Show local tasks
    Tasks {
        /// Only tasks of this list
        #[arg(short, long)]
        list: Option<String>,
    },

    /// Show local task lists
    Lists,

    /// Remove tombstoned entities no queue item references
    PurgeTombstones {
        /// Only tombstones older than this many days
        #[arg(short, long, default_value = "30")]
        older_than_days: u64,

        /// Dry run - show what would be removed
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the default level
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("tasksync CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("store format v{}", tasksync_store::FORMAT_VERSION);
        return Ok(());
    }

    let path = cli.store.ok_or("Store path required (--store)")?;
    let store = commands::open(&path)?;
    tracing::debug!(path = %path.display(), "store opened");

    match cli.command {
        Commands::Status { format } => commands::status::run(&store, &format)?,
        Commands::Retry { id } => commands::queue::retry(&store, id)?,
        Commands::Discard { id } => commands::queue::discard(&store, id)?,
        Commands::Tasks { list } => commands::entities::tasks(&store, list.as_deref()),
        Commands::Lists => commands::entities::lists(&store),
        Commands::PurgeTombstones {
            older_than_days,
            dry_run,
        } => commands::purge::run(&store, older_than_days, dry_run)?,
        Commands::Version => {}
    }

    Ok(())
}

//! SyncFlow CLI
//!
//! Command-line tools for SyncFlow queues stored on disk.
//!
//! # Commands
//!
//! - `enqueue` - Add a pending operation to the queue
//! - `sync` - Run reconciliation cycles
//! - `run` - Run the periodic engine until interrupted
//! - `pending` - List pending operations
//! - `purge` - Remove pending operations
//! - `cleanup` - Remove completed operations
//! - `entities` - Show the snapshot of an entity type
//! - `clean` - Remove all operations and snapshots

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use syncflow_engine::SyncConfig;
use tracing_subscriber::EnvFilter;

/// SyncFlow command-line queue tools.
#[derive(Parser)]
#[command(name = "syncflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the queue directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a pending operation to the queue
    Enqueue {
        /// Operation type (create, update, delete)
        op_type: String,

        /// Entity type the operation targets
        entity: String,

        /// Operation payload as a JSON object
        data: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run reconciliation cycles
    Sync {
        /// Number of cycles to run
        #[arg(short = 'n', long, default_value = "1")]
        cycles: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the periodic engine until interrupted
    Run {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List pending operations
    Pending {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove pending operations
    Purge {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove completed operations
    Cleanup,

    /// Show the snapshot of an entity type
    Entities {
        /// Entity type to show
        entity_type: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove all operations and snapshots
    Clean {
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => commands::load_config(path)?,
        None => SyncConfig::default(),
    };

    // Initialize logging
    let level = if cli.verbose || config.debug {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("SyncFlow CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let path = cli.path.ok_or("Queue path required (--path)")?;
    let engine = commands::open_engine(&path, config)?;

    match cli.command {
        Commands::Enqueue {
            op_type,
            entity,
            data,
            format,
        } => {
            commands::enqueue::run(engine.store(), &op_type, &entity, &data, &format).await?;
        }
        Commands::Sync { cycles, format } => {
            commands::sync::run(&engine, cycles, &format).await?;
        }
        Commands::Run { format } => {
            commands::sync::run_until_interrupted(&engine, &format).await?;
        }
        Commands::Pending { format } => {
            commands::queue::pending(&engine, &format).await?;
        }
        Commands::Purge { format } => {
            commands::queue::purge(&engine, &format).await?;
        }
        Commands::Cleanup => {
            commands::queue::cleanup(&engine).await?;
        }
        Commands::Entities {
            entity_type,
            format,
        } => {
            commands::queue::entities(&engine, &entity_type, &format).await?;
        }
        Commands::Clean { yes } => {
            if !yes {
                return Err("Refusing to remove all data without --yes".into());
            }
            commands::queue::clean(&engine).await?;
        }
        Commands::Version => {}
    }

    Ok(())
}

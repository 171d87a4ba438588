//! Lorekeep CLI
//!
//! Command-line tools for Lorekeep local stores.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and recorded stamps
//! - `dump` - Print the records of one collection
//! - `pull` - Refresh collections from a backend
//! - `destroy` - Erase a store
//! - `id` - Generate or decode record ids

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Lorekeep command-line store tools.
#[derive(Parser)]
#[command(name = "lorekeep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and recorded stamps
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the records of one collection
    Dump {
        /// Collection to dump
        collection: String,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Refresh collections from a backend
    Pull {
        /// Backend base URL
        #[arg(short, long)]
        url: String,

        /// RPC endpoint path
        #[arg(long, default_value = "/rpc")]
        rpc_path: String,

        /// Bearer token
        #[arg(short, long)]
        token: String,

        /// Collection to pull (repeatable)
        #[arg(short, long = "collection")]
        collections: Vec<String>,

        /// Refresh even when the stamps agree
        #[arg(long)]
        force: bool,
    },

    /// Erase a store
    Destroy {
        /// Actually erase; otherwise only report
        #[arg(long)]
        yes: bool,
    },

    /// Generate or decode record ids
    Id {
        /// Number of ids to generate
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Decode the timestamp of an id instead
        #[arg(short, long)]
        decode: Option<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format).await?;
        }
        Commands::Dump {
            collection,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&path, &collection, limit, &format).await?;
        }
        Commands::Pull {
            url,
            rpc_path,
            token,
            collections,
            force,
        } => {
            let path = cli.path.ok_or("Store path required for pull")?;
            let options = commands::pull::PullOptions {
                url: &url,
                rpc_path: &rpc_path,
                token: &token,
                collections: &collections,
                force,
            };
            commands::pull::run(&path, options).await?;
        }
        Commands::Destroy { yes } => {
            let path = cli.path.ok_or("Store path required for destroy")?;
            commands::destroy::run(&path, yes).await?;
        }
        Commands::Id { count, decode } => {
            commands::id::run(count, decode.as_deref())?;
        }
        Commands::Version => {
            println!("Lorekeep CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Wire protocol v{}", lorekeep_protocol::PROTOCOL_VERSION);
        }
    }

    Ok(())
}

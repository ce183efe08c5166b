//! waystate CLI
//!
//! Recovery tooling for a waystate document root.
//!
//! # Commands
//!
//! - `score` - Print the completeness score of a directory
//! - `report` - Print the full completeness report
//! - `verify` - Verify stored checksums and the snapshot manifest
//! - `snapshot` - Write a snapshot manifest for a directory
//! - `checksums` - Store checksums for the profile's files
//! - `recover` - Resolve artifacts left by an interrupted process

mod commands;

use clap::{Parser, Subcommand};
use commands::profile::Profile;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// waystate recovery tools.
#[derive(Parser)]
#[command(name = "waystate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the document root
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Completeness and integrity profile (JSON)
    #[arg(global = true, long)]
    profile: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the completeness score of a directory
    Score {
        /// Directory relative to the root (defaults to the root)
        dir: Option<PathBuf>,

        /// Fail if the score is below the profile's minimum
        #[arg(short, long)]
        check: bool,
    },

    /// Print the full completeness report
    Report {
        /// Directory relative to the root (defaults to the root)
        dir: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify stored checksums and the snapshot manifest
    Verify {
        /// Directory relative to the root (defaults to the root)
        dir: Option<PathBuf>,
    },

    /// Write a snapshot manifest for a directory
    Snapshot {
        /// Directory relative to the root (defaults to the root)
        dir: Option<PathBuf>,
    },

    /// Store checksums for the profile's files
    Checksums {
        /// Directory relative to the root (defaults to the root)
        dir: Option<PathBuf>,
    },

    /// Resolve artifacts left by an interrupted process
    Recover {
        /// Only list what would be resolved
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("waystate CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("waystate core v{}", waystate_core::VERSION);
        return Ok(());
    }

    let root = cli.path.ok_or("Document root path required (--path)")?;
    let profile = Profile::load(cli.profile.as_deref())?;

    match cli.command {
        Commands::Score { dir, check } => {
            commands::score::run(&root, &profile, &dir.unwrap_or_default(), check)?;
        }
        Commands::Report { dir, format } => {
            commands::report::run(&root, &profile, &dir.unwrap_or_default(), &format)?;
        }
        Commands::Verify { dir } => {
            commands::verify::run(&root, &profile, &dir.unwrap_or_default())?;
        }
        Commands::Snapshot { dir } => {
            commands::snapshot::run(&root, &profile, &dir.unwrap_or_default())?;
        }
        Commands::Checksums { dir } => {
            commands::snapshot::store_checksums(&root, &profile, &dir.unwrap_or_default())?;
        }
        Commands::Recover { dry_run } => {
            commands::recover::run(&root, &profile, dry_run)?;
        }
        Commands::Version => {}
    }

    Ok(())
}

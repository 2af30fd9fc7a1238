//! TxVault CLI
//!
//! Command-line tools for TxVault store maintenance.
//!
//! # Commands
//!
//! - `backup` - create, list, validate, and summarize backups
//! - `restore` - restore a backup onto the live store
//! - `pitr` - point-in-time recovery
//! - `health` - probe the live store
//! - `disaster-recovery` - automated recovery from the newest good backup
//! - `cleanup` - prune old backups by age and count
//! - `audit` - show the audit log

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// TxVault command-line maintenance tools.
#[derive(Parser)]
#[command(name = "txvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the live store file
    #[arg(global = true, short, long, default_value = "store.tvdb")]
    store: PathBuf,

    /// Backup directory (default: `backups` next to the store)
    #[arg(global = true, short, long)]
    backup_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, list, validate, and summarize backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Restore a backup onto the live store (or another target)
    Restore {
        /// Backup id to restore
        id: String,

        /// Restore onto this path instead of the live store
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// Restore to the most recent backup at or before a timestamp
    Pitr {
        /// Target timestamp, RFC 3339 (e.g. 2026-08-06T12:00:00Z)
        timestamp: String,
    },

    /// Probe the live store's health
    Health,

    /// Recover automatically from the newest good backup
    DisasterRecovery,

    /// Prune old backups by age and count
    Cleanup {
        /// Delete backups older than this many days
        #[arg(long, default_value_t = 30)]
        max_age_days: i64,

        /// Keep at most this many backups
        #[arg(long, default_value_t = 10)]
        max_count: usize,

        /// Allow deleting even the last restorable backup
        #[arg(long)]
        no_retain_latest: bool,
    },

    /// Show the audit log
    Audit {
        /// Show only the last N entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Create a full backup
    Create {
        /// Compress the artifact with zstd
        #[arg(short, long)]
        compress: bool,

        /// Skip validation after creation
        #[arg(long)]
        no_validate: bool,
    },

    /// List all backups
    List,

    /// Validate one backup's integrity
    Validate {
        /// Backup id to validate
        id: String,
    },

    /// Show one backup's metadata
    Info {
        /// Backup id to show
        id: String,
    },

    /// Show aggregate backup status
    Status,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backup_dir = cli.backup_dir.unwrap_or_else(|| {
        cli.store
            .parent()
            .map(|p| p.join("backups"))
            .unwrap_or_else(|| PathBuf::from("backups"))
    });

    let result = match cli.command {
        Commands::Backup { action } => match action {
            BackupAction::Create {
                compress,
                no_validate,
            } => commands::backup::create(&cli.store, &backup_dir, compress, !no_validate),
            BackupAction::List => commands::backup::list(&backup_dir),
            BackupAction::Validate { id } => commands::backup::validate(&backup_dir, &id),
            BackupAction::Info { id } => commands::backup::info(&backup_dir, &id),
            BackupAction::Status => commands::backup::status(&backup_dir),
        },
        Commands::Restore { id, target } => {
            commands::restore::run(&cli.store, &backup_dir, &id, target.as_deref())
        }
        Commands::Pitr { timestamp } => {
            commands::restore::point_in_time(&cli.store, &backup_dir, &timestamp)
        }
        Commands::Health => commands::health::run(&cli.store, &backup_dir),
        Commands::DisasterRecovery => {
            commands::health::disaster_recovery(&cli.store, &backup_dir)
        }
        Commands::Cleanup {
            max_age_days,
            max_count,
            no_retain_latest,
        } => commands::cleanup::run(
            &backup_dir,
            max_age_days,
            max_count,
            !no_retain_latest,
        ),
        Commands::Audit { limit } => commands::audit::run(&cli.store, limit),
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

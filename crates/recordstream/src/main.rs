//! recordstream - record file ingestion daemon
//!
//! Watches a directory for ledger record files and loads them into SQLite,
//! verifying the hash chain as it goes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use recordstream::store::{CursorStore, SqliteStore};
use recordstream::{
    read_previous_hash_at, FixedDirectory, IngestConfig, Ingester, Scanner, StopSignal,
};

/// recordstream - record file ingestion
#[derive(Parser, Debug)]
#[command(name = "recordstream")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error, or a full directive)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override the input directory
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Override the database path
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest record files until stopped (default)
    Run,

    /// Print the previous hash a record file declares
    PrevHash {
        /// Record file
        file: PathBuf,
    },

    /// Print the ingestion cursor and bypass boundary
    Status,

    /// Set or clear the file name up to which hash mismatches are tolerated
    SetBypass {
        /// Last file name inside the bypass window
        #[arg(required_unless_present = "clear")]
        name: Option<String>,

        /// Remove the bypass boundary
        #[arg(long, conflicts_with = "name")]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = match &cli.config {
        Some(path) => IngestConfig::load(path)?,
        None => IngestConfig::default(),
    };
    if let Some(dir) = cli.input_dir {
        config.input_dir = dir;
    }
    if let Some(db) = cli.database {
        config.database = db;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::PrevHash { file } => {
            let hash = read_previous_hash_at(&file)?;
            println!("{hash}");
            Ok(())
        }
        Commands::Status => {
            let store = open_store(&config)?;
            let cursor = store.last_processed_hash()?;
            let bypass = store.bypass_boundary()?;
            println!(
                "last processed hash: {}",
                cursor.map_or_else(|| "-".to_string(), |h| h.to_hex())
            );
            println!("bypass until after:  {}", bypass.as_deref().unwrap_or("-"));
            Ok(())
        }
        Commands::SetBypass { name, clear } => {
            let store = open_store(&config)?;
            let boundary = if clear { None } else { name };
            store.set_bypass_boundary(boundary.as_deref())?;
            info!(boundary = boundary.as_deref().unwrap_or("-"), "bypass boundary updated");
            Ok(())
        }
    }
}

fn open_store(config: &IngestConfig) -> Result<SqliteStore> {
    SqliteStore::open(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.display()))
}

async fn run(config: IngestConfig) -> Result<()> {
    let store = Arc::new(open_store(&config)?);
    let ingester = Ingester::new(store.clone(), store).with_archive_dir(config.resolved_archive_dir());
    let scanner = Scanner::new(ingester, config.poll_interval());
    let resolver = FixedDirectory::new(&config.input_dir);
    let signal = StopSignal::new(&config.stop_file);

    let on_interrupt = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current file");
            on_interrupt.interrupt();
        }
    });

    info!(
        input_dir = %config.input_dir.display(),
        database = %config.database.display(),
        "starting record file ingestion"
    );

    let summary = tokio::task::spawn_blocking(move || scanner.run(&resolver, &signal))
        .await
        .context("ingestion loop panicked")?;

    info!(
        cycles = summary.cycles,
        committed = summary.committed,
        skipped = summary.skipped,
        halts = summary.halts,
        "ingestion stopped"
    );
    Ok(())
}

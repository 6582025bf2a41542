//! Telemetry Cache maintenance tool
//!
//! Inspects and maintains the on-disk tier of the cache between application
//! runs. The memory tier lives only inside the application process.
//!
//! # Usage
//! ```text
//! telemetry-cache [--dir <PATH>] [stats | repair | purge-expired | clear]
//! ```
//! Configuration is read from `CACHE_*` environment variables.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telemetry_cache::{Config, DiskCache};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache directory, overrides CACHE_DIR
    #[arg(long)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print disk tier statistics (default)
    Stats,
    /// Reconcile the index with the files on disk
    Repair,
    /// Remove expired entries
    PurgeExpired,
    /// Remove every entry
    Clear,
}

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telemetry_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Stats);

    let mut config = Config::from_env();
    if let Some(dir) = args.dir {
        config.disk_dir = dir;
    }
    config.validate()?;
    info!(
        dir = %config.disk_dir.display(),
        disk_max_size_bytes = config.disk_max_size_bytes,
        "Configuration loaded"
    );

    // Opening runs the one-time consistency repair
    let disk = DiskCache::open(&config.disk_dir, config.disk_max_size_bytes, config.default_ttl)
        .with_context(|| format!("failed to open disk cache at {}", config.disk_dir.display()))?;

    let output = match command {
        Command::Stats => serde_json::to_value(disk.stats()?)?,
        Command::Repair => serde_json::to_value(disk.repair()?)?,
        Command::PurgeExpired => json!({ "purged": disk.purge_expired()? }),
        Command::Clear => {
            disk.clear()?;
            json!({ "cleared": true })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

//! bucketsync - reconcile buckets with a YAML description.
//!
//! # Usage
//!
//! ```text
//! bucketsync buckets.yaml [--dry-run] [--rsync-only] [--recheck-remote] [--concurrency N] [-v | --debug]
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `AWS_ACCESS_KEY_ID` | Access key id when neither the file nor the command line sets one |
//! | `AWS_SECRET_ACCESS_KEY` | Secret access key, same fallback |
//! | `RUST_LOG` | Tracing filter; overrides `-v` and `--debug` |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bucketsync_client::CallStats;
use bucketsync_core::{Connector, DEFAULT_CONCURRENCY, SyncOptions, load_config};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reconcile object-storage buckets with a declarative description.
#[derive(Debug, Parser)]
#[command(name = "bucketsync", version, about)]
struct Args {
    /// YAML file describing one bucket or a list of buckets
    config: PathBuf,

    /// Access key id used when the configuration does not set one
    #[arg(long)]
    access_key_id: Option<String>,

    /// Secret access key used when the configuration does not set one
    #[arg(long)]
    secret_access_key: Option<String>,

    /// Only mirror directories; skip bucket attributes, key syncs and redirects
    #[arg(long)]
    rsync_only: bool,

    /// Log the planned changes without making them
    #[arg(long)]
    dry_run: bool,

    /// List the bucket again before syncing unchanged keys
    #[arg(long)]
    recheck_remote: bool,

    /// Number of concurrent requests; 0 or less runs sequentially
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, allow_negative_numbers = true)]
    concurrency: i64,

    /// Log actions as they happen
    #[arg(short, long, conflicts_with = "debug")]
    verbose: bool,

    /// Log every request
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    fn options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            rsync_only: self.rsync_only,
            recheck_remote: self.recheck_remote,
            concurrency: self.concurrency,
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise the level selected on the command line.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level())?;

    let configs = load_config(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let stats = Arc::new(CallStats::new());
    let connector = Connector::new()
        .with_credentials(args.access_key_id.clone(), args.secret_access_key.clone())
        .with_metrics(Arc::clone(&stats) as _);

    // Resolve every bucket before touching any of them.
    let buckets = configs
        .iter()
        .map(|config| {
            connector
                .connect(config)
                .with_context(|| format!("invalid configuration for bucket {}", config.bucket))
        })
        .collect::<Result<Vec<_>>>()?;

    let options = args.options();
    for bucket in &buckets {
        let report = bucket
            .sync(&options)
            .await
            .with_context(|| format!("failed to sync bucket {}", bucket.name()))?;
        info!(
            bucket = %report.bucket,
            state = %report.state,
            uploads = report.uploads,
            syncs = report.syncs,
            redirects = report.redirects,
            deletes = report.deletes,
            dry_run = report.dry_run,
            "bucket synced"
        );
    }

    info!(calls = %stats, total = stats.total(), "requests sent");
    Ok(())
}

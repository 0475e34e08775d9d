use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use asset_sync::cache::{JsonFileCache, restore_snapshot};
use asset_sync::io::{HttpTableSource, TableSource, WorkbookSource, export_snapshot};
use asset_sync::{
    FieldDictionary, Result, SyncConfig, SyncCoordinator, SyncError, SyncOutcome, SyncSnapshot,
    logging,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = logging::init(cli.verbose) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but a refresh did not commit.
async fn run(cli: Cli) -> Result<bool> {
    match &cli.command {
        Command::Refresh => execute_refresh(&cli).await,
        Command::List { search } => {
            let snapshot = load_snapshot(&cli).await?;
            let products = snapshot.search_products(search.as_deref().unwrap_or(""));
            print_json(&products)?;
            Ok(true)
        }
        Command::Show { product } => {
            let snapshot = load_snapshot(&cli).await?;
            let found = snapshot
                .find_product(product)
                .ok_or_else(|| SyncError::ProductNotFound(product.clone()))?;
            let sn = found.sn();
            print_json(&json!({
                "product": found,
                "summary": snapshot.repair_summary(sn),
                "repairs": snapshot.repairs_newest_first(sn),
                "maintenance": snapshot.maintenance_by_sn(sn),
                "specs": snapshot.specs_by_sn(sn),
            }))?;
            Ok(true)
        }
        Command::Export { output } => {
            let snapshot = load_snapshot(&cli).await?;
            export_snapshot(output, &snapshot, &FieldDictionary::standard())?;
            Ok(true)
        }
    }
}

async fn execute_refresh(cli: &Cli) -> Result<bool> {
    let coordinator = cli.coordinator()?;
    warm_start(&coordinator);
    let outcome = coordinator.refresh().await;
    print_json(&outcome_report(&outcome))?;
    Ok(outcome.is_committed())
}

/// Seeds the coordinator from the cache, warning when a cache exists but
/// cannot be read.
fn warm_start(coordinator: &SyncCoordinator) {
    if let Err(error) = coordinator.warm_start_if_cached() {
        warn!(%error, "ignoring unreadable cached snapshot");
    }
}

/// Offline mode reads the cache only; otherwise a refresh is attempted and
/// the cache serves as fallback.
async fn load_snapshot(cli: &Cli) -> Result<Arc<SyncSnapshot>> {
    if cli.offline {
        let cache = JsonFileCache::new(&cli.cache_dir);
        return Ok(Arc::new(restore_snapshot(&cache)?));
    }

    let coordinator = cli.coordinator()?;
    warm_start(&coordinator);
    let outcome = coordinator.refresh().await;
    let snapshot = coordinator.snapshot();
    if let SyncOutcome::Failed { error, .. } = &outcome {
        eprintln!("warning: refresh failed: {error}");
        if snapshot.is_empty() {
            return Err(SyncError::CacheMiss);
        }
    } else if let SyncOutcome::FallbackApplied { error, .. } = &outcome {
        eprintln!("warning: showing cached data, refresh failed: {error}");
    }
    Ok(snapshot)
}

fn outcome_report(outcome: &SyncOutcome) -> Value {
    let (state, products) = match outcome {
        SyncOutcome::Committed { products, .. } => ("committed", Some(*products)),
        SyncOutcome::FallbackApplied { .. } => ("fallback", None),
        SyncOutcome::Failed { .. } => ("failed", None),
        SyncOutcome::Superseded { .. } => ("superseded", None),
    };
    json!({
        "state": state,
        "generation": outcome.generation(),
        "products": products,
        "error": outcome.error().map(ToString::to_string),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Sync and query the product, repair, maintenance and spec tables."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Endpoint serving the tables.
    #[arg(long, global = true, env = "ASSET_SYNC_BASE_URL")]
    base_url: Option<String>,

    /// Read the tables from a local workbook instead of the endpoint.
    #[arg(long, global = true)]
    workbook: Option<PathBuf>,

    /// Directory holding the cached snapshot.
    #[arg(long, global = true, env = "ASSET_SYNC_CACHE_DIR", default_value = ".asset-sync")]
    cache_dir: PathBuf,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "ASSET_SYNC_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Use the cached snapshot without contacting the backend.
    #[arg(long, global = true)]
    offline: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch all tables and update the cache.
    Refresh,
    /// List products, optionally filtered by a search term.
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one product with its repairs, maintenance and specs.
    Show {
        /// Product id or serial number.
        product: String,
    },
    /// Write the current snapshot to an .xlsx workbook.
    Export {
        output: PathBuf,
    },
}

impl Cli {
    fn source(&self) -> Result<Arc<dyn TableSource>> {
        if let Some(path) = &self.workbook {
            if !path.exists() {
                return Err(SyncError::InvalidConfig(format!(
                    "workbook not found: {}",
                    path.display()
                )));
            }
            return Ok(Arc::new(WorkbookSource::new(path)));
        }

        let base_url = self.base_url.clone().ok_or_else(|| {
            SyncError::InvalidConfig("either --base-url or --workbook is required".into())
        })?;
        let mut config = SyncConfig::new(base_url, &self.cache_dir);
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(Arc::new(HttpTableSource::new(&config)?))
    }

    fn coordinator(&self) -> Result<SyncCoordinator> {
        let cache = JsonFileCache::new(&self.cache_dir);
        Ok(SyncCoordinator::new(self.source()?, Arc::new(cache)))
    }
}

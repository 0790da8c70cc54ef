use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use transfer_engine::application::engine::TransferEngine;
use transfer_engine::config::{EngineArgs, EngineConfig};
use transfer_engine::domain::ports::{AccountStore, AccountStoreRef};
use transfer_engine::domain::transfer::TransferRequest;
use transfer_engine::error::TransferError;
use transfer_engine::infrastructure::in_memory::{InMemoryAccountCache, InMemoryAccountStore};
use transfer_engine::interfaces::csv::account_writer::AccountWriter;
use transfer_engine::interfaces::csv::reader::CsvSource;
use transfer_engine::logging::init_logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Transfers CSV file (`from,to,amount`)
    input: PathBuf,

    /// Accounts CSV file (`id,balance`) provisioned before any transfer runs.
    #[arg(long)]
    accounts: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Execute every transfer concurrently instead of in file order.
    #[arg(long)]
    parallel: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, env = "TRANSFER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(flatten)]
    engine: EngineArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = EngineConfig::from(&cli.engine);
    let store = open_store(cli.db_path.as_deref(), &config)?;

    if let Some(path) = &cli.accounts {
        provision(store.as_ref(), path).await?;
    }

    let engine = Arc::new(TransferEngine::new(
        store.clone(),
        Arc::new(InMemoryAccountCache::new()),
        &config,
    ));

    let file = File::open(&cli.input).into_diagnostic()?;
    let requests = CsvSource::new(file)
        .transfers()
        .filter_map(|row| match row {
            Ok(request) => Some(request),
            Err(e) => {
                warn!(error = %e, "Error reading transfer");
                None
            }
        });

    if cli.parallel {
        let mut tasks = JoinSet::new();
        for request in requests {
            let engine = Arc::clone(&engine);
            tasks.spawn(async move {
                let outcome = engine.submit(&request).await;
                (request, outcome)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let (request, outcome) = joined.into_diagnostic()?;
            report(&request, outcome);
        }
    } else {
        for request in requests {
            let outcome = engine.submit(&request).await;
            report(&request, outcome);
        }
    }

    let accounts = store.all().await?;
    let stdout = io::stdout();
    AccountWriter::new(stdout.lock()).write_accounts(accounts)?;

    Ok(())
}

fn open_store(db_path: Option<&Path>, config: &EngineConfig) -> Result<AccountStoreRef> {
    match db_path {
        None => {
            let mut store = InMemoryAccountStore::new();
            if let Some(timeout) = config.lock_timeout {
                store = store.with_lock_timeout(timeout);
            }
            Ok(Arc::new(store))
        }
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            use transfer_engine::infrastructure::rocksdb::RocksDBStore;
            Ok(Arc::new(RocksDBStore::open(path, config.lock_timeout)?))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => Err(miette::miette!(
            "--db-path needs a build with the `storage-rocksdb` feature"
        )),
    }
}

/// Seeds the store in a single unit of work; a bad row provisions nothing.
async fn provision(store: &dyn AccountStore, path: &Path) -> Result<()> {
    let file = File::open(path).into_diagnostic()?;
    let mut unit = store.begin().await?;
    for account in CsvSource::new(file).accounts() {
        unit.save(&account?).await?;
    }
    unit.commit().await?;
    Ok(())
}

fn report(request: &TransferRequest, outcome: Result<(), TransferError>) {
    let TransferRequest { from, to, amount } = request;
    match outcome {
        Ok(()) => debug!(%from, %to, amount, "transfer committed"),
        Err(e) if e.is_client_error() => warn!(%from, %to, amount, error = %e, "transfer rejected"),
        Err(e) => error!(%from, %to, amount, error = %e, "transfer failed"),
    }
}

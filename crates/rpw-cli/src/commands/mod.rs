//! Command handlers for the `rpw` binary.
//!
//! Every sync mode shares one setup path: resolve secrets, connect, take the
//! run lock, build the adapters, run the engine, release the lock.

use anyhow::{Context, Result};
use rpw_config::{Catalog, LoggingConfig, SyncConfig};
use rpw_db::{PgPool, PgStore};
use rpw_schemas::BlockNumber;
use rpw_source::XChainSource;
use rpw_sync::{CheckpointStore, SyncEngine, SyncReport};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Engine entry point selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    Full,
    Incremental,
    List(Vec<String>),
    Start(String),
    Initiate(Option<Vec<String>>),
    Addresses,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Console layer on stderr (stdout carries the report), plus a daily-rolling
/// file under `logging.dir` when configured. Keep the guard alive until exit.
pub fn init_tracing(cfg: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let console = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let (file, guard) = match &cfg.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log dir failed: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "rpw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("tracing subscriber already initialized")?;
    Ok(guard)
}

// ---------------------------------------------------------------------------
// checkpoint
// ---------------------------------------------------------------------------

/// Print the checkpoint. `--set` overwrites it while holding the run lock.
pub async fn checkpoint(cfg: &SyncConfig, set: Option<BlockNumber>) -> Result<()> {
    let cp = CheckpointStore::from_config(cfg);
    if let Some(block) = set {
        let secrets = rpw_config::resolve_secrets(cfg)?;
        let lock = rpw_db::try_acquire_run_lock(&secrets.database_url).await?;
        let written = cp.write(block).map_err(anyhow::Error::from);
        let released = lock.release().await;
        keep_run_outcome(written, released)?;
        tracing::warn!(block, path = %cp.path().display(), "checkpoint overwritten by operator");
    }
    println!("checkpoint={}", cp.read()?);
    println!("state_file={}", cp.path().display());
    Ok(())
}

// ---------------------------------------------------------------------------
// sync modes
// ---------------------------------------------------------------------------

pub async fn run_sync(cfg: &SyncConfig, cmd: SyncCommand) -> Result<SyncReport> {
    let secrets = rpw_config::resolve_secrets(cfg)?;
    let lock = rpw_db::try_acquire_run_lock(&secrets.database_url).await?;

    let result = async {
        let pool = rpw_db::connect(&secrets.database_url, cfg.database.max_connections).await?;
        run_locked(cfg, &pool, cmd).await
    }
    .await;

    let released = lock.release().await;
    keep_run_outcome(result, released)
}

/// The run's outcome wins over an unlock failure, which is only logged;
/// closing the session frees the lock.
fn keep_run_outcome<T>(result: Result<T>, released: Result<()>) -> Result<T> {
    if let Err(e) = released {
        tracing::warn!(error = %format!("{e:#}"), "run lock release failed");
    }
    result
}

async fn run_locked(cfg: &SyncConfig, pool: &PgPool, cmd: SyncCommand) -> Result<SyncReport> {
    let burns = match &cmd {
        SyncCommand::Initiate(_) => {
            rpw_db::bootstrap_schema(pool).await?;
            rpw_config::load_burn_addresses(&cfg.paths.burn_addresses_file)?
        }
        _ => Vec::new(),
    };

    let catalog: Catalog = rpw_config::load_catalog(&cfg.paths.catalog_file)?;
    let source = XChainSource::new(&cfg.source)?;
    let store = PgStore::new(pool.clone());
    let cp = CheckpointStore::from_config(cfg);
    let mut engine = SyncEngine::new(&store, &source, &cp, &catalog, cfg);

    match cmd {
        SyncCommand::Full => engine.full().await,
        SyncCommand::Incremental => engine.incremental().await,
        SyncCommand::List(names) => engine.sync_list(&names).await,
        SyncCommand::Start(name) => engine.sync_from(&name).await,
        SyncCommand::Addresses => engine.addresses().await,
        SyncCommand::Initiate(names) => engine.initiate(names.as_deref(), &burns).await,
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use rpw_schemas::BlockNumber;

mod commands;

use commands::SyncCommand;

#[derive(Parser)]
#[command(name = "rpw")]
#[command(about = "Mirror catalog assets from the remote ledger into the local store", long_about = None)]
struct Cli {
    /// Config layers in merge order (repeatable; later overrides earlier)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-sync every catalog asset, then catch up on blocks seen meanwhile
    Full,

    /// Sync the named assets only (comma-separated)
    List {
        /// e.g. PEPECASH,RAREPEPE
        #[arg(required = true, value_delimiter = ',')]
        names: Vec<String>,
    },

    /// Sync the catalog from the named asset to the end
    Start {
        #[arg(required = true)]
        name: String,
    },

    /// Incremental sync of assets touched since the checkpoint block
    Sync,

    /// First-time load: insert missing assets and flag burn addresses
    Initiate {
        /// Restrict to these assets (comma-separated); default is the whole catalog
        #[arg(value_delimiter = ',')]
        names: Option<Vec<String>>,
    },

    /// Record every dispenser source as a known address
    Addresses,

    /// Print the checkpoint block, or overwrite it with --set (takes the run lock)
    Checkpoint {
        #[arg(long)]
        set: Option<BlockNumber>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // dev-time bootstrap; real deployments export the env directly
    dotenvy::from_filename(".env.local").ok();

    let cli = Cli::parse();

    let path_refs: Vec<&str> = cli.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = rpw_config::load_sync_config(&path_refs)?;
    let _log_guard = commands::init_tracing(&loaded.config.logging)?;
    tracing::info!(config_hash = %loaded.config_hash, "config loaded");

    let cmd = match cli.cmd {
        Commands::Checkpoint { set } => {
            return commands::checkpoint(&loaded.config, set).await;
        }
        Commands::Full => SyncCommand::Full,
        Commands::List { names } => SyncCommand::List(names),
        Commands::Start { name } => SyncCommand::Start(name),
        Commands::Sync => SyncCommand::Incremental,
        Commands::Initiate { names } => SyncCommand::Initiate(names),
        Commands::Addresses => SyncCommand::Addresses,
    };

    let report = commands::run_sync(&loaded.config, cmd).await?;
    for (k, v) in report.key_values() {
        println!("{}={}", k, v);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

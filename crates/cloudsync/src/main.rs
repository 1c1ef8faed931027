mod commands;
mod utils;

use clap::{Parser, Subcommand};
use cloudsync_core::ResourceKind;
use std::path::PathBuf;
use utils::Target;

#[derive(Parser)]
#[command(name = "cloudsync")]
#[command(about = "Reconcile cloud inventories into a local inventory", long_about = None)]
struct Cli {
    /// Config file (skips discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync resource kinds from a cloud snapshot
    Sync {
        #[command(flatten)]
        target: Target,
        /// Kinds to sync, in order (e.g. vpc,subnet,disk)
        #[arg(short, long, value_delimiter = ',', required_unless_present = "with_relations")]
        kind: Vec<ResourceKind>,
        /// Sync instances together with everything they reference
        #[arg(long, conflicts_with = "kind")]
        with_relations: bool,
        /// Report what would change without saving the state
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove local rows whose resource is gone upstream
    Sweep {
        #[command(flatten)]
        target: Target,
        /// Kinds to sweep
        #[arg(short, long, value_delimiter = ',', required = true)]
        kind: Vec<ResourceKind>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Reconcile hosts owned by the external host inventory
    #[command(subcommand)]
    Hosts(HostCommands),
    /// Show what the local inventory holds
    Status,
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum HostCommands {
    /// Create or update the given hosts
    Sync {
        /// Snapshot carrying the external host inventory
        #[arg(long, env = "CLOUDSYNC_SNAPSHOT")]
        snapshot: PathBuf,
        #[arg(short, long, env = "CLOUDSYNC_ACCOUNT")]
        account: String,
        /// Host ids to sync (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        host_ids: Vec<i64>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete hosts the inventory no longer reports
    Remove {
        #[arg(long, env = "CLOUDSYNC_SNAPSHOT")]
        snapshot: PathBuf,
        #[arg(short, long, env = "CLOUDSYNC_ACCOUNT")]
        account: String,
        /// Business whose hosts are checked
        #[arg(long, allow_hyphen_values = true)]
        biz_id: i64,
        /// Delete exactly these hosts instead of scanning the business
        #[arg(long, value_delimiter = ',')]
        host_ids: Vec<i64>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Version needs no config
    if matches!(cli.command, Commands::Version) {
        println!("cloudsync {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => cloudsync_config::load_from(path)?,
        None => cloudsync_config::load()?,
    };
    init_tracing(&config.log.filter);

    match cli.command {
        Commands::Sync {
            target,
            kind,
            with_relations,
            dry_run,
        } => {
            commands::sync::handle(&config, &target, &kind, with_relations, dry_run).await?;
        }
        Commands::Sweep {
            target,
            kind,
            dry_run,
        } => {
            commands::sweep::handle(&config, &target, &kind, dry_run).await?;
        }
        Commands::Hosts(HostCommands::Sync {
            snapshot,
            account,
            host_ids,
            dry_run,
        }) => {
            commands::hosts::handle_sync(&config, &snapshot, &account, host_ids, dry_run).await?;
        }
        Commands::Hosts(HostCommands::Remove {
            snapshot,
            account,
            biz_id,
            host_ids,
            dry_run,
        }) => {
            commands::hosts::handle_remove(&config, &snapshot, &account, biz_id, host_ids, dry_run)
                .await?;
        }
        Commands::Status => {
            commands::status::handle(&config).await?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}

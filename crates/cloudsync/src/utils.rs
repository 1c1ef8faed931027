use anyhow::Context;
use clap::Args;
use cloudsync_config::Config;
use cloudsync_core::{
    CloudSnapshot, MemoryStore, StateLock, StateManager, SyncBaseParams, SyncSummary,
};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

/// Account and scope shared by the resource commands
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Cloud inventory snapshot (JSON)
    #[arg(long, env = "CLOUDSYNC_SNAPSHOT")]
    pub snapshot: std::path::PathBuf,
    /// Account the snapshot belongs to
    #[arg(short, long, env = "CLOUDSYNC_ACCOUNT")]
    pub account: String,
    #[arg(long)]
    pub region: Option<String>,
    #[arg(long)]
    pub zone: Option<String>,
    #[arg(long)]
    pub resource_group: Option<String>,
    /// Restrict to these cloud ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub cloud_ids: Vec<String>,
}

impl Target {
    pub fn params(&self) -> SyncBaseParams {
        let mut params = SyncBaseParams::new(&self.account);
        if let Some(region) = &self.region {
            params = params.with_region(region);
        }
        if let Some(zone) = &self.zone {
            params = params.with_zone(zone);
        }
        if let Some(group) = &self.resource_group {
            params = params.with_resource_group(group);
        }
        if !self.cloud_ids.is_empty() {
            params = params.with_cloud_ids(self.cloud_ids.clone());
        }
        params
    }
}

pub async fn load_snapshot(path: &Path) -> anyhow::Result<CloudSnapshot> {
    CloudSnapshot::load(path)
        .await
        .with_context(|| format!("failed to load snapshot {}", path.display()))
}

/// The locked local inventory for one command
pub struct Workspace {
    state: StateManager,
    lock: StateLock,
    pub store: Arc<MemoryStore>,
}

impl Workspace {
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let state = StateManager::new(&config.state_dir);
        let lock = state.acquire_lock().await?;
        let snapshot = state.load().await?;
        let store = Arc::new(
            MemoryStore::from_snapshot(snapshot).with_max_batch(config.limits.batch_operation_max),
        );
        Ok(Self { state, lock, store })
    }

    /// Persist what was applied, even when the command failed part way
    pub async fn finish(self, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            println!("{}", "dry run: state not saved".dimmed());
        } else {
            self.state.save(&self.store.snapshot()).await?;
        }
        self.lock.release().await?;
        Ok(())
    }
}

pub fn print_summary(label: &str, summary: &SyncSummary) {
    if summary.is_empty() {
        println!("  {} {}", label.cyan(), "up to date".dimmed());
    } else {
        println!("  {} {}", label.cyan(), summary);
    }
}

pub fn print_total(summary: &SyncSummary) {
    println!();
    if summary.is_empty() {
        println!("{}", "✓ Nothing to change".green().bold());
    } else {
        println!("{}", format!("✓ {}", summary).green().bold());
    }
}

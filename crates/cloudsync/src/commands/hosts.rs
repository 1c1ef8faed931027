use crate::utils::{self, Workspace};
use cloudsync_config::Config;
use cloudsync_core::MemoryHostSource;
use cloudsync_engine::{HostReconciler, RemoveHostParams, SyncHostParams};
use colored::Colorize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

pub async fn handle_sync(
    config: &Config,
    snapshot: &Path,
    account: &str,
    host_ids: Vec<i64>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let snapshot = utils::load_snapshot(snapshot).await?;
    println!(
        "{}",
        format!("Syncing {} host(s) for account '{}'...", host_ids.len(), account).blue()
    );

    let ws = Workspace::open(config).await?;
    let source = Arc::new(MemoryHostSource::new(snapshot.hosts));
    let hosts = HostReconciler::new(account, source, ws.store.clone(), config.limits)?;

    let result = hosts.sync_hosts(SyncHostParams::new(host_ids)).await;
    ws.finish(dry_run).await?;
    let summary = result?;
    utils::print_summary("hosts", &summary);
    utils::print_total(&summary);
    Ok(())
}

pub async fn handle_remove(
    config: &Config,
    snapshot: &Path,
    account: &str,
    biz_id: i64,
    del_host_ids: Vec<i64>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let snapshot = utils::load_snapshot(snapshot).await?;
    println!(
        "{}",
        format!("Checking hosts of business {}...", biz_id).blue()
    );

    // the snapshot is the inventory's current view of the business
    let existing_host_ids: HashSet<i64> = snapshot
        .hosts
        .iter()
        .filter(|h| h.biz_id == biz_id)
        .map(|h| h.host_id)
        .collect();

    let ws = Workspace::open(config).await?;
    let source = Arc::new(MemoryHostSource::new(snapshot.hosts));
    let hosts = HostReconciler::new(account, source, ws.store.clone(), config.limits)?;

    let result = hosts
        .remove_hosts(RemoveHostParams {
            biz_id,
            existing_host_ids,
            del_host_ids,
        })
        .await;
    ws.finish(dry_run).await?;
    let summary = result?;
    utils::print_summary("hosts", &summary);
    utils::print_total(&summary);
    Ok(())
}

use crate::utils::{self, Target, Workspace};
use cloudsync_config::Config;
use cloudsync_core::{MemoryCloud, ResourceKind, SyncSummary};
use cloudsync_engine::VendorSyncer;
use colored::Colorize;
use std::sync::Arc;

pub async fn handle(
    config: &Config,
    target: &Target,
    kinds: &[ResourceKind],
    dry_run: bool,
) -> anyhow::Result<()> {
    let snapshot = utils::load_snapshot(&target.snapshot).await?;
    println!(
        "{}",
        format!(
            "Sweeping {} account '{}'...",
            snapshot.vendor, target.account
        )
        .blue()
    );

    let ws = Workspace::open(config).await?;
    let cloud = Arc::new(MemoryCloud::from_snapshot(&snapshot));
    let syncer = VendorSyncer::new(cloud, ws.store.clone(), config.limits)?;
    let params = target.params();

    let mut total = SyncSummary::default();
    let mut failure = None;
    for kind in kinds {
        match syncer.remove_deleted_from_cloud(*kind, &params).await {
            Ok(deleted) => {
                let summary = SyncSummary {
                    deleted,
                    ..Default::default()
                };
                utils::print_summary(kind.as_str(), &summary);
                total += summary;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    ws.finish(dry_run).await?;
    if let Some(e) = failure {
        return Err(e.into());
    }
    utils::print_total(&total);
    Ok(())
}

use crate::utils::{self, Target, Workspace};
use cloudsync_config::Config;
use cloudsync_core::{MemoryCloud, ResourceKind, SyncBaseParams, SyncSummary};
use cloudsync_engine::VendorSyncer;
use colored::Colorize;
use std::sync::Arc;

pub async fn handle(
    config: &Config,
    target: &Target,
    kinds: &[ResourceKind],
    with_relations: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let snapshot = utils::load_snapshot(&target.snapshot).await?;
    println!(
        "{}",
        format!(
            "Syncing {} account '{}'...",
            snapshot.vendor, target.account
        )
        .blue()
    );

    let ws = Workspace::open(config).await?;
    let cloud = Arc::new(MemoryCloud::from_snapshot(&snapshot));
    let syncer = VendorSyncer::new(cloud, ws.store.clone(), config.limits)?;

    let result = run(&syncer, &target.params(), kinds, with_relations).await;
    ws.finish(dry_run).await?;
    utils::print_total(&result?);
    Ok(())
}

async fn run(
    syncer: &VendorSyncer,
    params: &SyncBaseParams,
    kinds: &[ResourceKind],
    with_relations: bool,
) -> anyhow::Result<SyncSummary> {
    if with_relations {
        let summary = syncer.sync_cvm_with_rel_res(params).await?;
        utils::print_summary("cvm with related resources", &summary);
        return Ok(summary);
    }

    let mut total = SyncSummary::default();
    for kind in kinds {
        let summary = syncer.sync_kind(*kind, params).await?;
        utils::print_summary(kind.as_str(), &summary);
        total += summary;
    }
    Ok(total)
}

//! Per-resource sync pipelines
//!
//! Every kind runs the same state machine:
//!
//! ```text
//! validate → list cloud → list db → (both empty? done) → diff
//!          → delete (guarded) → create → update
//! ```
//!
//! Kind differences live in small `ResourceAdapter`s.

mod adapter;

pub use adapter::{DiskAdapter, ResourceAdapter, StandardAdapter, spec_changed};

use crate::fanout::try_for_each_bounded;
use crate::resolve::{IdResolver, list_all, list_by_cloud_ids};
use cloudsync_core::guard::ensure_absent_upstream;
use cloudsync_core::{
    CloudClient, CloudResource, DataService, ListOption, Page, ResourceCreate, ResourceFilter,
    ResourceKind, ResourceRecord, ResourceRef, ResourceUpdate, Result, SyncBaseParams, SyncLimits,
    SyncSummary, Vendor, VendorProfile, diff,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Runs sync pipelines for one vendor against one store
pub struct VendorSyncer {
    vendor: Vendor,
    profile: VendorProfile,
    cloud: Arc<dyn CloudClient>,
    db: Arc<dyn DataService>,
    limits: SyncLimits,
}

impl VendorSyncer {
    pub fn new(
        cloud: Arc<dyn CloudClient>,
        db: Arc<dyn DataService>,
        limits: SyncLimits,
    ) -> Result<Self> {
        limits.validate()?;
        let vendor = cloud.vendor();
        let profile = VendorProfile::of(vendor)?;
        Ok(Self {
            vendor,
            profile,
            cloud,
            db,
            limits,
        })
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn profile(&self) -> &VendorProfile {
        &self.profile
    }

    pub fn limits(&self) -> &SyncLimits {
        &self.limits
    }

    pub(crate) fn cloud(&self) -> &dyn CloudClient {
        self.cloud.as_ref()
    }

    pub(crate) fn db(&self) -> &dyn DataService {
        self.db.as_ref()
    }

    fn cloud_chunk(&self) -> usize {
        self.profile.chunk_size(self.limits.cloud_resource_sync_max)
    }

    /// Sync one kind with the default adapter
    pub async fn sync_kind(
        &self,
        kind: ResourceKind,
        params: &SyncBaseParams,
    ) -> Result<SyncSummary> {
        self.sync_with(&StandardAdapter::new(kind), params).await
    }

    /// Sync disks, marking the given ids as boot disks
    pub async fn sync_disks(
        &self,
        params: &SyncBaseParams,
        boot_disks: HashSet<String>,
    ) -> Result<SyncSummary> {
        self.sync_with(&DiskAdapter::new(boot_disks), params).await
    }

    /// Sync one kind through a custom adapter
    pub async fn sync_with(
        &self,
        adapter: &dyn ResourceAdapter,
        params: &SyncBaseParams,
    ) -> Result<SyncSummary> {
        params.validate(&self.limits)?;
        let scope = params.list_option();
        let filter = params.filter(self.vendor);
        self.reconcile(
            adapter,
            &params.account_id,
            &scope,
            &filter,
            params.cloud_ids.as_deref(),
        )
        .await
    }

    /// Sync the network interfaces of each instance, one task per instance
    pub async fn sync_instance_interfaces(
        &self,
        params: &SyncBaseParams,
        cvm_cloud_ids: &[String],
    ) -> Result<SyncSummary> {
        params.validate(&self.limits)?;
        if cvm_cloud_ids.is_empty() {
            return Ok(SyncSummary::default());
        }

        let adapter = StandardAdapter::new(ResourceKind::NetworkInterface);
        let summaries =
            try_for_each_bounded(cvm_cloud_ids.to_vec(), self.limits.concurrency, |cvm_id| {
                let adapter = &adapter;
                async move {
                    let scope = params.list_option().with_owner(cvm_id.clone());
                    let filter = params
                        .filter(self.vendor)
                        .with_owner(Some(cvm_id.clone()));
                    self.reconcile(adapter, &params.account_id, &scope, &filter, None)
                        .await
                        .inspect_err(|e| {
                            tracing::error!(
                                vendor = %self.vendor,
                                account_id = %params.account_id,
                                cvm = %cvm_id,
                                error = %e,
                                "sync instance network interfaces failed"
                            );
                        })
                }
            })
            .await?;

        Ok(summaries.into_iter().sum())
    }

    /// Delete stored rows of `kind` that no longer exist upstream.
    ///
    /// Walks the stored inventory of the scope page by page; returns the
    /// number of rows removed.
    pub async fn remove_deleted_from_cloud(
        &self,
        kind: ResourceKind,
        params: &SyncBaseParams,
    ) -> Result<usize> {
        params.validate(&self.limits)?;
        let scope = params.list_option();
        let filter = params.filter(self.vendor);
        let limit = self.limits.batch_operation_max;

        let mut start = 0;
        let mut removed = 0;
        loop {
            let rows = self
                .db
                .list_resources(kind, &filter, Page::new(start, limit))
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        vendor = %self.vendor,
                        account_id = %params.account_id,
                        kind = %kind,
                        start,
                        error = %e,
                        "list from db failed"
                    );
                })?;
            let count = rows.len();
            if count == 0 {
                break;
            }

            let ids: Vec<String> = rows.into_iter().map(|r| r.cloud_id).collect();
            let alive: HashSet<String> = self
                .list_from_cloud(kind, &scope, Some(&ids))
                .await?
                .into_iter()
                .map(|r| r.cloud_id)
                .collect();
            let stale: Vec<String> = ids.into_iter().filter(|id| !alive.contains(id)).collect();

            if !stale.is_empty() {
                self.delete_with_guard(kind, &scope, &filter, &stale).await?;
                removed += stale.len();
            }

            if count < limit {
                break;
            }
            // deleted rows shift the rest of the inventory down
            start += count - stale.len();
        }

        if removed > 0 {
            tracing::info!(
                vendor = %self.vendor,
                account_id = %params.account_id,
                kind = %kind,
                count = removed,
                "removed resources deleted from cloud"
            );
        }
        Ok(removed)
    }

    async fn reconcile(
        &self,
        adapter: &dyn ResourceAdapter,
        account_id: &str,
        scope: &ListOption,
        filter: &ResourceFilter,
        cloud_ids: Option<&[String]>,
    ) -> Result<SyncSummary> {
        let kind = adapter.kind();

        let mut cloud_items = self.list_from_cloud(kind, scope, cloud_ids).await?;
        adapter.prepare(&mut cloud_items);
        let db_items = self.list_from_db(kind, filter, cloud_ids).await?;

        if cloud_items.is_empty() && db_items.is_empty() {
            return Ok(SyncSummary::default());
        }

        let plan = diff(
            cloud_items,
            &db_items,
            |c| c.cloud_id.as_str(),
            |d| d.cloud_id.as_str(),
            |d| d.id.as_str(),
            |c, d| adapter.is_changed(c, d),
        );
        let summary = plan.summary();
        tracing::debug!(
            vendor = %self.vendor,
            account_id,
            kind = %kind,
            create = summary.created,
            update = summary.updated,
            delete = summary.deleted,
            "diff computed"
        );

        if !plan.to_delete.is_empty() {
            self.delete_with_guard(kind, scope, filter, &plan.to_delete)
                .await?;
        }
        if !plan.to_create.is_empty() {
            self.create(kind, account_id, plan.to_create).await?;
        }
        if !plan.to_update.is_empty() {
            self.update(kind, account_id, plan.to_update).await?;
        }

        Ok(summary)
    }

    pub(crate) async fn list_from_cloud(
        &self,
        kind: ResourceKind,
        scope: &ListOption,
        cloud_ids: Option<&[String]>,
    ) -> Result<Vec<CloudResource>> {
        let log_err = |e: &cloudsync_core::SyncError| {
            tracing::error!(
                vendor = %self.vendor,
                kind = %kind,
                scope = ?scope,
                error = %e,
                "list from cloud failed"
            );
        };

        let Some(ids) = cloud_ids else {
            return self.cloud.list(kind, scope).await.inspect_err(log_err);
        };

        let mut out = Vec::new();
        for batch in ids.chunks(self.cloud_chunk()) {
            let opt = ListOption {
                cloud_ids: Some(batch.to_vec()),
                ..scope.clone()
            };
            out.extend(self.cloud.list(kind, &opt).await.inspect_err(log_err)?);
        }
        Ok(out)
    }

    async fn list_from_db(
        &self,
        kind: ResourceKind,
        filter: &ResourceFilter,
        cloud_ids: Option<&[String]>,
    ) -> Result<Vec<ResourceRecord>> {
        match cloud_ids {
            Some(ids) => {
                list_by_cloud_ids(
                    self.db(),
                    kind,
                    filter,
                    ids,
                    self.limits.batch_operation_max,
                    self.limits.page_limit,
                )
                .await
            }
            None => list_all(self.db(), kind, filter, self.limits.page_limit).await,
        }
    }

    async fn delete_with_guard(
        &self,
        kind: ResourceKind,
        scope: &ListOption,
        filter: &ResourceFilter,
        cloud_ids: &[String],
    ) -> Result<()> {
        ensure_absent_upstream(
            self.cloud(),
            kind,
            &ListOption {
                cloud_ids: None,
                ..scope.clone()
            },
            cloud_ids,
            self.cloud_chunk(),
        )
        .await?;

        for batch in cloud_ids.chunks(self.limits.batch_operation_max) {
            let filter = filter.clone().with_cloud_ids(batch.to_vec());
            self.db
                .batch_delete_resources(kind, &filter)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        vendor = %self.vendor,
                        kind = %kind,
                        ids = ?batch,
                        error = %e,
                        "batch delete from db failed"
                    );
                })?;
        }

        tracing::info!(
            vendor = %self.vendor,
            account_id = ?filter.account_id,
            kind = %kind,
            count = cloud_ids.len(),
            "deleted resources"
        );
        Ok(())
    }

    async fn create(
        &self,
        kind: ResourceKind,
        account_id: &str,
        items: Vec<CloudResource>,
    ) -> Result<()> {
        let refs = self.resolve_refs(account_id, &items).await?;
        let count = items.len();
        let creates: Vec<ResourceCreate> = items
            .into_iter()
            .zip(refs)
            .map(|(cloud, refs)| ResourceCreate {
                vendor: self.vendor,
                account_id: account_id.to_string(),
                cloud,
                refs,
            })
            .collect();

        let mut creates = creates.into_iter().peekable();
        while creates.peek().is_some() {
            let batch: Vec<ResourceCreate> =
                creates.by_ref().take(self.limits.batch_operation_max).collect();
            let ids: Vec<String> = batch.iter().map(|c| c.cloud.cloud_id.clone()).collect();
            self.db
                .batch_create_resources(kind, batch)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        vendor = %self.vendor,
                        account_id,
                        kind = %kind,
                        ids = ?ids,
                        error = %e,
                        "batch create in db failed"
                    );
                })?;
        }

        tracing::info!(
            vendor = %self.vendor,
            account_id,
            kind = %kind,
            count,
            "created resources"
        );
        Ok(())
    }

    async fn update(
        &self,
        kind: ResourceKind,
        account_id: &str,
        items: BTreeMap<String, CloudResource>,
    ) -> Result<()> {
        let (ids, clouds): (Vec<String>, Vec<CloudResource>) = items.into_iter().unzip();
        let refs = self.resolve_refs(account_id, &clouds).await?;
        let count = ids.len();
        let updates: Vec<ResourceUpdate> = ids
            .into_iter()
            .zip(clouds)
            .zip(refs)
            .map(|((id, cloud), refs)| ResourceUpdate { id, cloud, refs })
            .collect();

        let mut updates = updates.into_iter().peekable();
        while updates.peek().is_some() {
            let batch: Vec<ResourceUpdate> =
                updates.by_ref().take(self.limits.batch_operation_max).collect();
            let ids: Vec<String> = batch.iter().map(|u| u.id.clone()).collect();
            self.db
                .batch_update_resources(kind, batch)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        vendor = %self.vendor,
                        account_id,
                        kind = %kind,
                        ids = ?ids,
                        error = %e,
                        "batch update in db failed"
                    );
                })?;
        }

        tracing::info!(
            vendor = %self.vendor,
            account_id,
            kind = %kind,
            count,
            "updated resources"
        );
        Ok(())
    }

    /// Resolve every foreign reference of `items` up front, so a miss fails
    /// the batch before anything is written
    async fn resolve_refs(
        &self,
        account_id: &str,
        items: &[CloudResource],
    ) -> Result<Vec<Vec<ResourceRef>>> {
        let mut wanted: BTreeMap<ResourceKind, BTreeSet<String>> = BTreeMap::new();
        for item in items {
            for (kind, id) in item.spec.references() {
                wanted.entry(kind).or_default().insert(id.to_string());
            }
        }
        if wanted.is_empty() {
            return Ok(vec![Vec::new(); items.len()]);
        }

        let resolver = IdResolver::new(
            self.db(),
            self.vendor,
            account_id,
            self.limits.batch_operation_max,
            self.limits.page_limit,
        );
        let mut resolved = BTreeMap::new();
        for (kind, ids) in wanted {
            let ids: Vec<String> = ids.into_iter().collect();
            resolved.insert(kind, resolver.resolve(kind, &ids).await?);
        }

        Ok(items
            .iter()
            .map(|item| {
                item.spec
                    .references()
                    .into_iter()
                    .filter_map(|(kind, cloud_id)| {
                        let id = resolved.get(&kind)?.get(cloud_id)?;
                        Some(ResourceRef {
                            kind,
                            cloud_id: cloud_id.to_string(),
                            id: id.clone(),
                        })
                    })
                    .collect()
            })
            .collect())
    }
}

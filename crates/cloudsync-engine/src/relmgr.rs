//! Relationship manager
//!
//! Accumulates, for one batch of instances, the cloud ids of everything
//! each instance is associated with. The lifecycle sync fills it during
//! discovery, drives the per-kind pipelines from it, and finally calls
//! `sync_relation` once per relation kind.

use crate::priority::plan_priority_upsert;
use crate::resolve::IdResolver;
use cloudsync_core::capability::{ensure_cvm_relation, group_by_resource_group};
use cloudsync_core::{
    DataService, RelationCreate, RelationRecord, RelationUpsert, ResourceKind, Result, SyncLimits,
    SyncSummary, Vendor,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;

/// Per-invocation association accumulator
#[derive(Debug, Clone)]
pub struct RelationshipManager {
    vendor: Vendor,
    account_id: String,
    limits: SyncLimits,
    /// instance cloud id → kind → associated cloud ids
    cvm_assoc: BTreeMap<String, BTreeMap<ResourceKind, Vec<String>>>,
    /// kind → parent cloud id → child cloud ids
    parent_children: BTreeMap<ResourceKind, BTreeMap<String, Vec<String>>>,
}

impl RelationshipManager {
    pub fn new(vendor: Vendor, account_id: impl Into<String>, limits: SyncLimits) -> Self {
        Self {
            vendor,
            account_id: account_id.into(),
            limits,
            cvm_assoc: BTreeMap::new(),
            parent_children: BTreeMap::new(),
        }
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Track an instance even if it has no associations yet
    pub fn add_cvm(&mut self, cvm_cloud_id: impl Into<String>) {
        self.cvm_assoc.entry(cvm_cloud_id.into()).or_default();
    }

    /// Record that an instance is associated with a resource; repeated
    /// calls are no-ops
    pub fn append_associated_cloud_id(
        &mut self,
        cvm_cloud_id: &str,
        kind: ResourceKind,
        cloud_id: impl Into<String>,
    ) {
        let cloud_id = cloud_id.into();
        let ids = self
            .cvm_assoc
            .entry(cvm_cloud_id.to_string())
            .or_default()
            .entry(kind)
            .or_default();
        if !ids.contains(&cloud_id) {
            ids.push(cloud_id);
        }
    }

    /// Record parent-scoped children of `kind`, merging with earlier calls
    pub fn register_parent_children(
        &mut self,
        kind: ResourceKind,
        children: BTreeMap<String, Vec<String>>,
    ) {
        let scoped = self.parent_children.entry(kind).or_default();
        for (parent, ids) in children {
            let entry = scoped.entry(parent).or_default();
            for id in ids {
                if !entry.contains(&id) {
                    entry.push(id);
                }
            }
        }
    }

    pub fn cvm_cloud_ids(&self) -> Vec<String> {
        self.cvm_assoc.keys().cloned().collect()
    }

    /// Every cloud id of `kind` across all instances, first seen first
    pub fn associated_cloud_ids(&self, kind: ResourceKind) -> Vec<String> {
        let mut seen = HashSet::new();
        self.cvm_assoc
            .values()
            .filter_map(|kinds| kinds.get(&kind))
            .flatten()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn parent_children(&self, kind: ResourceKind) -> Option<&BTreeMap<String, Vec<String>>> {
        self.parent_children.get(&kind)
    }

    fn sync_max(&self) -> usize {
        self.limits.cloud_resource_sync_max.max(1)
    }

    /// Run `apply` over every accumulated id of `kind` in provider-sized
    /// batches, stopping at the first error
    pub async fn sync_kind<F, Fut>(&self, kind: ResourceKind, mut apply: F) -> Result<SyncSummary>
    where
        F: FnMut(Vec<String>) -> Fut,
        Fut: Future<Output = Result<SyncSummary>>,
    {
        let mut total = SyncSummary::default();
        for batch in self.associated_cloud_ids(kind).chunks(self.sync_max()) {
            total += apply(batch.to_vec()).await?;
        }
        Ok(total)
    }

    /// Like `sync_kind`, partitioned by the resource group named in each id
    pub async fn sync_kind_by_resource_group<F, Fut>(
        &self,
        kind: ResourceKind,
        mut apply: F,
    ) -> Result<SyncSummary>
    where
        F: FnMut(String, Vec<String>) -> Fut,
        Fut: Future<Output = Result<SyncSummary>>,
    {
        let ids = self.associated_cloud_ids(kind);
        let mut total = SyncSummary::default();
        for (group, ids) in group_by_resource_group(&ids)? {
            for batch in ids.chunks(self.sync_max()) {
                total += apply(group.clone(), batch.to_vec()).await?;
            }
        }
        Ok(total)
    }

    /// Run `apply` per registered parent of `kind`
    pub async fn sync_parent_scoped<F, Fut>(
        &self,
        kind: ResourceKind,
        mut apply: F,
    ) -> Result<SyncSummary>
    where
        F: FnMut(String, Vec<String>) -> Fut,
        Fut: Future<Output = Result<SyncSummary>>,
    {
        let mut total = SyncSummary::default();
        let Some(scoped) = self.parent_children.get(&kind) else {
            return Ok(total);
        };
        for (parent, ids) in scoped {
            for batch in ids.chunks(self.sync_max()) {
                total += apply(parent.clone(), batch.to_vec()).await?;
            }
        }
        Ok(total)
    }

    /// Parent-scoped and resource-group partitioned at the same time
    pub async fn sync_parent_scoped_by_resource_group<F, Fut>(
        &self,
        kind: ResourceKind,
        mut apply: F,
    ) -> Result<SyncSummary>
    where
        F: FnMut(String, String, Vec<String>) -> Fut,
        Fut: Future<Output = Result<SyncSummary>>,
    {
        let mut total = SyncSummary::default();
        let Some(scoped) = self.parent_children.get(&kind) else {
            return Ok(total);
        };
        for (parent, ids) in scoped {
            for (group, ids) in group_by_resource_group(ids)? {
                for batch in ids.chunks(self.sync_max()) {
                    total += apply(group.clone(), parent.clone(), batch.to_vec()).await?;
                }
            }
        }
        Ok(total)
    }

    /// Reconcile the relation rows of `kind` for every tracked instance.
    ///
    /// Instances and associated resources must already be stored; any id
    /// without a local row fails the whole kind before a write is made.
    pub async fn sync_relation(
        &self,
        db: &dyn DataService,
        kind: ResourceKind,
    ) -> Result<SyncSummary> {
        ensure_cvm_relation(self.vendor, kind).inspect_err(|e| {
            tracing::error!(
                vendor = %self.vendor,
                kind = %kind,
                error = %e,
                "relation sync rejected"
            );
        })?;

        let cvm_cloud_ids = self.cvm_cloud_ids();
        if cvm_cloud_ids.is_empty() {
            return Ok(SyncSummary::default());
        }

        let resolver = IdResolver::new(
            db,
            self.vendor,
            &self.account_id,
            self.limits.batch_operation_max,
            self.limits.page_limit,
        );
        let cvm_ids = resolver.resolve(ResourceKind::Cvm, &cvm_cloud_ids).await?;
        let res_ids = resolver
            .resolve(kind, &self.associated_cloud_ids(kind))
            .await?;

        // local instance id → local resource ids in cloud order
        let mut desired: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (cvm_cloud_id, kinds) in &self.cvm_assoc {
            let Some(cvm_id) = cvm_ids.get(cvm_cloud_id) else {
                continue;
            };
            let wanted = desired.entry(cvm_id.clone()).or_default();
            for cloud_id in kinds.get(&kind).into_iter().flatten() {
                if let Some(res_id) = res_ids.get(cloud_id) {
                    if !wanted.contains(res_id) {
                        wanted.push(res_id.clone());
                    }
                }
            }
        }

        let local_cvm_ids: Vec<String> = desired.keys().cloned().collect();
        let mut existing: HashMap<String, Vec<RelationRecord>> = HashMap::new();
        for batch in local_cvm_ids.chunks(self.limits.batch_operation_max) {
            let rows = db
                .list_relations(self.vendor, kind, batch)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        vendor = %self.vendor,
                        account_id = %self.account_id,
                        kind = %kind,
                        cvm_ids = ?batch,
                        error = %e,
                        "list relations failed"
                    );
                })?;
            for row in rows {
                existing.entry(row.cvm_id.clone()).or_default().push(row);
            }
        }

        let summary = if kind.is_ordered_relation() {
            self.apply_ordered(db, kind, &desired, &existing).await?
        } else {
            self.apply_unordered(db, kind, &desired, &existing).await?
        };

        if !summary.is_empty() {
            tracing::info!(
                vendor = %self.vendor,
                account_id = %self.account_id,
                kind = %kind,
                created = summary.created,
                deleted = summary.deleted,
                "synced relations"
            );
        }
        Ok(summary)
    }

    async fn apply_unordered(
        &self,
        db: &dyn DataService,
        kind: ResourceKind,
        desired: &BTreeMap<String, Vec<String>>,
        existing: &HashMap<String, Vec<RelationRecord>>,
    ) -> Result<SyncSummary> {
        let mut deletes: Vec<u64> = Vec::new();
        let mut creates: Vec<RelationCreate> = Vec::new();

        for (cvm_id, wanted) in desired {
            let rows = existing.get(cvm_id).map(Vec::as_slice).unwrap_or_default();
            let mut kept: HashSet<&str> = HashSet::new();
            for row in rows {
                // duplicate rows of one pair are dropped as well
                if wanted.contains(&row.res_id) && kept.insert(row.res_id.as_str()) {
                    continue;
                }
                deletes.push(row.id);
            }
            creates.extend(
                wanted
                    .iter()
                    .filter(|res_id| !kept.contains(res_id.as_str()))
                    .map(|res_id| RelationCreate::new(cvm_id.clone(), res_id.clone())),
            );
        }

        let summary = SyncSummary {
            created: creates.len(),
            updated: 0,
            deleted: deletes.len(),
        };

        for batch in deletes.chunks(self.limits.batch_operation_max) {
            db.batch_delete_relations(self.vendor, kind, batch)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        vendor = %self.vendor,
                        kind = %kind,
                        ids = ?batch,
                        error = %e,
                        "batch delete relations failed"
                    );
                })?;
        }
        for batch in creates.chunks(self.limits.batch_operation_max) {
            db.batch_create_relations(self.vendor, kind, batch.to_vec())
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        vendor = %self.vendor,
                        kind = %kind,
                        count = batch.len(),
                        error = %e,
                        "batch create relations failed"
                    );
                })?;
        }

        Ok(summary)
    }

    async fn apply_ordered(
        &self,
        db: &dyn DataService,
        kind: ResourceKind,
        desired: &BTreeMap<String, Vec<String>>,
        existing: &HashMap<String, Vec<RelationRecord>>,
    ) -> Result<SyncSummary> {
        let max = self.limits.batch_operation_max.max(1);
        let mut summary = SyncSummary::default();
        let mut pending: Vec<RelationUpsert> = Vec::new();
        let mut current = RelationUpsert::default();

        for (cvm_id, wanted) in desired {
            let rows = existing.get(cvm_id).map(Vec::as_slice).unwrap_or_default();
            let Some(plan) = plan_priority_upsert(cvm_id, wanted, rows) else {
                continue;
            };

            let kept: HashSet<u64> = plan
                .deletes
                .iter()
                .flat_map(|d| d.keep_ids.iter().copied())
                .collect();
            summary.deleted += rows.iter().filter(|r| !kept.contains(&r.id)).count();
            summary.created += plan.creates.len();

            // one instance's deletes travel with its first creates
            let mut deletes = plan.deletes;
            let mut creates = plan.creates.into_iter().peekable();
            loop {
                let room = max - current.creates.len();
                let overflow = current.creates.len() + creates.len() > max;
                if room == 0 || (overflow && !current.is_empty()) {
                    pending.push(std::mem::take(&mut current));
                    continue;
                }
                current.deletes.append(&mut deletes);
                current.creates.extend(creates.by_ref().take(room));
                if creates.peek().is_none() {
                    break;
                }
            }
        }
        if !current.is_empty() {
            pending.push(current);
        }

        for upsert in pending {
            let count = upsert.creates.len();
            db.upsert_relations(self.vendor, kind, upsert)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        vendor = %self.vendor,
                        kind = %kind,
                        count,
                        error = %e,
                        "upsert relations failed"
                    );
                })?;
        }

        Ok(summary)
    }
}

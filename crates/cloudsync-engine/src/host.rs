//! External-source host reconciler
//!
//! Hosts owned by a third-party CMDB rather than a cloud API. A stored
//! host is found by host id first and by (vendor, cloud id) second, since
//! a cloud instance may have been synced before its host id was known.

use cloudsync_core::model::{UNASSIGNED_BIZ, split_ips};
use cloudsync_core::{
    DataService, ExternalHost, HostCreate, HostFilter, HostRecord, HostSource, HostUpdate, Page,
    Result, SyncError, SyncLimits, SyncSummary, Vendor,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

const CMDB_CLOUD_ID_PREFIX: &str = "_cmdb_";

/// Cloud id given to hosts created from the external source
pub fn build_cloud_id_from_host_id(host_id: i64) -> String {
    format!("{}{}", CMDB_CLOUD_ID_PREFIX, host_id)
}

pub fn host_id_from_cloud_id(cloud_id: &str) -> Result<i64> {
    cloud_id
        .strip_prefix(CMDB_CLOUD_ID_PREFIX)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| SyncError::InvalidInput(format!("not a cmdb host cloud id: {}", cloud_id)))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncHostParams {
    pub host_ids: Vec<i64>,
    /// Hosts already fetched by the caller; only the rest are queried
    #[serde(default, skip_serializing)]
    pub host_cache: HashMap<i64, ExternalHost>,
}

impl SyncHostParams {
    pub fn new(host_ids: Vec<i64>) -> Self {
        Self {
            host_ids,
            host_cache: HashMap::new(),
        }
    }

    pub fn with_cache(mut self, hosts: impl IntoIterator<Item = ExternalHost>) -> Self {
        self.host_cache
            .extend(hosts.into_iter().map(|h| (h.host_id, h)));
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveHostParams {
    pub biz_id: i64,
    /// Hosts the external source still reports for the business
    #[serde(default)]
    pub existing_host_ids: HashSet<i64>,
    /// Explicit ids to delete; when set, the business scan is skipped
    #[serde(default)]
    pub del_host_ids: Vec<i64>,
}

/// Writes computed for one batch of reported hosts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostPlan {
    pub creates: Vec<HostCreate>,
    pub updates: Vec<HostUpdate>,
}

/// Outcome of the business-scoped cleanup scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BizHostRemoval {
    pub host_ids: Vec<i64>,
    /// Rows owned by a cloud vendor that the external source no longer
    /// reports; never deleted here
    pub foreign: Vec<HostRecord>,
}

fn same_ips(reported: &str, stored: &[String]) -> bool {
    split_ips(reported).into_iter().collect::<BTreeSet<_>>()
        == stored.iter().cloned().collect::<BTreeSet<_>>()
}

fn host_changed(host: &ExternalHost, rec: &HostRecord) -> bool {
    rec.host_id != Some(host.host_id)
        || rec.name != host.name
        || rec.biz_id != host.biz_id
        || rec.cloud_area_id != host.cloud_area_id
        || !same_ips(&host.inner_ipv4, &rec.private_ipv4)
        || !same_ips(&host.outer_ipv4, &rec.public_ipv4)
        || !same_ips(&host.inner_ipv6, &rec.private_ipv6)
        || !same_ips(&host.outer_ipv6, &rec.public_ipv6)
}

fn full_update(id: &str, host: &ExternalHost) -> HostUpdate {
    HostUpdate {
        id: id.to_string(),
        host_id: Some(host.host_id),
        name: Some(host.name.clone()),
        biz_id: Some(host.biz_id),
        cloud_area_id: Some(host.cloud_area_id),
        private_ipv4: Some(split_ips(&host.inner_ipv4)),
        public_ipv4: Some(split_ips(&host.outer_ipv4)),
        private_ipv6: Some(split_ips(&host.inner_ipv6)),
        public_ipv6: Some(split_ips(&host.outer_ipv6)),
    }
}

/// Classify reported hosts against the stored ones.
///
/// `by_host_id` holds stored rows keyed by host id, `by_cloud_key` rows
/// keyed by (vendor, cloud id).
pub fn plan_host_diff(
    account_id: &str,
    hosts: &[ExternalHost],
    by_host_id: &HashMap<i64, HostRecord>,
    by_cloud_key: &HashMap<(Vendor, String), HostRecord>,
) -> HostPlan {
    let mut plan = HostPlan::default();
    let mut seen = HashSet::new();

    for host in hosts {
        if !seen.insert(host.host_id) {
            continue;
        }

        if let Some(rec) = by_host_id.get(&host.host_id) {
            // cloud-sourced rows are maintained by their vendor's sync
            if rec.vendor == Vendor::Other && host_changed(host, rec) {
                plan.updates.push(full_update(&rec.id, host));
            }
            continue;
        }

        if let Some((vendor, cloud_id)) = host.cloud_key() {
            if let Some(rec) = by_cloud_key.get(&(vendor, cloud_id.to_string())) {
                if rec.vendor != Vendor::Other && rec.host_id.is_none() {
                    plan.updates.push(HostUpdate::bind(&rec.id, host.host_id));
                }
                continue;
            }
        }

        plan.creates.push(HostCreate {
            account_id: account_id.to_string(),
            cloud_id: build_cloud_id_from_host_id(host.host_id),
            name: host.name.clone(),
            host_id: host.host_id,
            biz_id: host.biz_id,
            cloud_area_id: host.cloud_area_id,
            region: host.region.clone(),
            private_ipv4: split_ips(&host.inner_ipv4),
            public_ipv4: split_ips(&host.outer_ipv4),
            private_ipv6: split_ips(&host.inner_ipv6),
            public_ipv6: split_ips(&host.outer_ipv6),
        });
    }

    plan
}

/// Pick the stored hosts of a business that the external source dropped
pub fn plan_biz_host_removal(stored: &[HostRecord], existing: &HashSet<i64>) -> BizHostRemoval {
    let mut out = BizHostRemoval::default();
    for rec in stored {
        let Some(host_id) = rec.host_id else {
            continue;
        };
        if existing.contains(&host_id) {
            continue;
        }
        if rec.vendor != Vendor::Other {
            out.foreign.push(rec.clone());
            continue;
        }
        if !out.host_ids.contains(&host_id) {
            out.host_ids.push(host_id);
        }
    }
    out
}

/// Reconciles stored hosts with an external host source
pub struct HostReconciler {
    account_id: String,
    source: Arc<dyn HostSource>,
    db: Arc<dyn DataService>,
    limits: SyncLimits,
}

impl HostReconciler {
    pub fn new(
        account_id: impl Into<String>,
        source: Arc<dyn HostSource>,
        db: Arc<dyn DataService>,
        limits: SyncLimits,
    ) -> Result<Self> {
        limits.validate()?;
        let account_id = account_id.into();
        if account_id.trim().is_empty() {
            return Err(SyncError::InvalidInput("account_id is required".into()));
        }
        Ok(Self {
            account_id,
            source,
            db,
            limits,
        })
    }

    /// Create or update the stored rows of the given hosts
    pub async fn sync_hosts(&self, params: SyncHostParams) -> Result<SyncSummary> {
        if params.host_ids.is_empty() {
            return Err(SyncError::InvalidInput("host_ids is required".into()));
        }
        if params.host_ids.len() > self.limits.cloud_resource_sync_max {
            return Err(SyncError::InvalidInput(format!(
                "host_ids should <= {}, got {}",
                self.limits.cloud_resource_sync_max,
                params.host_ids.len()
            )));
        }

        let hosts = self.fetch_hosts(params).await?;
        if hosts.is_empty() {
            return Ok(SyncSummary::default());
        }

        let host_ids: Vec<i64> = hosts.iter().map(|h| h.host_id).collect();
        let mut by_host_id = HashMap::new();
        for batch in host_ids.chunks(self.limits.batch_operation_max) {
            let filter = HostFilter::by_host_ids(batch.to_vec());
            for rec in self.list_hosts(&filter).await? {
                if let Some(host_id) = rec.host_id {
                    by_host_id.insert(host_id, rec);
                }
            }
        }

        let mut unmatched: HashMap<Vendor, Vec<String>> = HashMap::new();
        for host in &hosts {
            if by_host_id.contains_key(&host.host_id) {
                continue;
            }
            if let Some((vendor, cloud_id)) = host.cloud_key() {
                unmatched
                    .entry(vendor)
                    .or_default()
                    .push(cloud_id.to_string());
            }
        }
        let mut by_cloud_key = HashMap::new();
        for (vendor, ids) in unmatched {
            for batch in ids.chunks(self.limits.batch_operation_max) {
                let filter = HostFilter::by_cloud_ids(vendor, batch.to_vec());
                for rec in self.list_hosts(&filter).await? {
                    by_cloud_key.insert((rec.vendor, rec.cloud_id.clone()), rec);
                }
            }
        }

        let plan = plan_host_diff(&self.account_id, &hosts, &by_host_id, &by_cloud_key);
        let summary = SyncSummary {
            created: plan.creates.len(),
            updated: plan.updates.len(),
            deleted: 0,
        };

        for batch in plan.creates.chunks(self.limits.batch_operation_max) {
            self.db
                .batch_create_hosts(batch.to_vec())
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        account_id = %self.account_id,
                        count = batch.len(),
                        error = %e,
                        "batch create hosts failed"
                    );
                })?;
        }
        for batch in plan.updates.chunks(self.limits.batch_operation_max) {
            self.db
                .batch_update_hosts(batch.to_vec())
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        account_id = %self.account_id,
                        count = batch.len(),
                        error = %e,
                        "batch update hosts failed"
                    );
                })?;
        }

        if !summary.is_empty() {
            tracing::info!(
                account_id = %self.account_id,
                created = summary.created,
                updated = summary.updated,
                "synced hosts"
            );
        }
        Ok(summary)
    }

    /// Delete hosts the external source no longer reports.
    ///
    /// Only rows created from the external source (vendor `other`) are
    /// ever deleted; unbound rows are left alone.
    pub async fn remove_hosts(&self, params: RemoveHostParams) -> Result<SyncSummary> {
        let host_ids = if params.del_host_ids.is_empty() {
            let stored = self.list_hosts(&HostFilter::by_biz(params.biz_id)).await?;
            let removal = plan_biz_host_removal(&stored, &params.existing_host_ids);
            for rec in &removal.foreign {
                if params.biz_id != UNASSIGNED_BIZ {
                    tracing::error!(
                        biz_id = params.biz_id,
                        host_id = ?rec.host_id,
                        vendor = %rec.vendor,
                        cloud_id = %rec.cloud_id,
                        "cloud host is missing from the external source"
                    );
                }
            }
            removal.host_ids
        } else {
            params.del_host_ids
        };

        if host_ids.is_empty() {
            return Ok(SyncSummary::default());
        }

        let mut deleted = 0;
        for batch in host_ids.chunks(self.limits.batch_operation_max) {
            let filter = HostFilter::by_host_ids(batch.to_vec()).with_vendor(Vendor::Other);
            let matched = self.list_hosts(&filter).await?.len();
            if matched == 0 {
                continue;
            }
            self.db.batch_delete_hosts(&filter).await.inspect_err(|e| {
                tracing::error!(
                    account_id = %self.account_id,
                    host_ids = ?batch,
                    error = %e,
                    "batch delete hosts failed"
                );
            })?;
            deleted += matched;
        }

        if deleted > 0 {
            tracing::info!(
                account_id = %self.account_id,
                biz_id = params.biz_id,
                count = deleted,
                "removed hosts"
            );
        }
        Ok(SyncSummary {
            deleted,
            ..Default::default()
        })
    }

    async fn fetch_hosts(&self, params: SyncHostParams) -> Result<Vec<ExternalHost>> {
        let SyncHostParams {
            host_ids,
            mut host_cache,
        } = params;

        let mut hosts = Vec::with_capacity(host_ids.len());
        let mut missing = Vec::new();
        for id in host_ids {
            match host_cache.remove(&id) {
                Some(host) => hosts.push(host),
                None => missing.push(id),
            }
        }

        for batch in missing.chunks(self.limits.batch_operation_max) {
            let fetched = self.source.list_hosts(batch).await.inspect_err(|e| {
                tracing::error!(
                    host_ids = ?batch,
                    error = %e,
                    "list hosts from external source failed"
                );
            })?;
            hosts.extend(fetched.into_iter().filter(|h| batch.contains(&h.host_id)));
        }
        Ok(hosts)
    }

    async fn list_hosts(&self, filter: &HostFilter) -> Result<Vec<HostRecord>> {
        let limit = self.limits.page_limit;
        let mut out = Vec::new();
        let mut start = 0;
        loop {
            let page = self
                .db
                .list_hosts(filter, Page::new(start, limit))
                .await
                .inspect_err(|e| {
                    tracing::error!(filter = ?filter, start, error = %e, "list hosts failed");
                })?;
            let count = page.len();
            out.extend(page);
            if count < limit {
                break;
            }
            start += count;
        }
        Ok(out)
    }
}

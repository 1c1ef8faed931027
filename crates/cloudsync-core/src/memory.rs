//! In-memory implementations of the capability contracts
//!
//! `MemoryCloud` and `MemoryStore` back the replay CLI and the test suites.
//! Both record the calls made against them.

use crate::batch::BATCH_OPERATION_MAX;
use crate::error::{Result, SyncError};
use crate::model::{
    CloudResource, CvmSpec, ExternalHost, HostBinding, HostCreate, HostRecord, HostUpdate,
    RelationCreate, RelationRecord, RelationUpsert, ResourceKind, ResourceRecord, ResourceSpec,
    Vendor,
};
use crate::provider::{CloudClient, HostSource, ListOption};
use crate::state::StoreSnapshot;
use crate::store::{
    DataService, HostFilter, Page, ResourceCreate, ResourceFilter, ResourceUpdate,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloud inventory of one account, as loaded by the replay CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudSnapshot {
    pub vendor: Vendor,
    #[serde(default)]
    pub resources: Vec<CloudResource>,
    /// External host inventory, for `other` hosts
    #[serde(default)]
    pub hosts: Vec<ExternalHost>,
}

impl CloudSnapshot {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: CloudSnapshot = serde_json::from_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            vendor = %snapshot.vendor,
            resources = snapshot.resources.len(),
            hosts = snapshot.hosts.len(),
            "loaded cloud snapshot"
        );
        Ok(snapshot)
    }
}

/// A cloud account held in memory
pub struct MemoryCloud {
    vendor: Vendor,
    resources: Mutex<Vec<CloudResource>>,
    calls: Mutex<Vec<(ResourceKind, ListOption)>>,
    list_calls: AtomicUsize,
    failing: Mutex<Option<ResourceKind>>,
}

impl MemoryCloud {
    pub fn new(vendor: Vendor, resources: Vec<CloudResource>) -> Self {
        Self {
            vendor,
            resources: Mutex::new(resources),
            calls: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            failing: Mutex::new(None),
        }
    }

    pub fn from_snapshot(snapshot: &CloudSnapshot) -> Self {
        Self::new(snapshot.vendor, snapshot.resources.clone())
    }

    /// Insert or replace a resource by (kind, cloud id)
    pub fn upsert(&self, res: CloudResource) {
        let mut resources = lock(&self.resources);
        match resources
            .iter_mut()
            .find(|r| r.kind() == res.kind() && r.cloud_id == res.cloud_id)
        {
            Some(existing) => *existing = res,
            None => resources.push(res),
        }
    }

    pub fn remove(&self, kind: ResourceKind, cloud_id: &str) {
        lock(&self.resources).retain(|r| !(r.kind() == kind && r.cloud_id == cloud_id));
    }

    /// Make every list call for `kind` fail
    pub fn fail_on(&self, kind: Option<ResourceKind>) {
        *lock(&self.failing) = kind;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(ResourceKind, ListOption)> {
        lock(&self.calls).clone()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
        self.list_calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl CloudClient for MemoryCloud {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn list(&self, kind: ResourceKind, opt: &ListOption) -> Result<Vec<CloudResource>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.calls).push((kind, opt.clone()));

        if *lock(&self.failing) == Some(kind) {
            return Err(SyncError::Upstream(format!("list {} failed", kind)));
        }

        Ok(lock(&self.resources)
            .iter()
            .filter(|r| r.kind() == kind && opt.matches(r))
            .cloned()
            .collect())
    }
}

/// A call recorded by `MemoryStore`
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    ListResources {
        kind: ResourceKind,
        filter: ResourceFilter,
        page: Page,
    },
    CreateResources {
        kind: ResourceKind,
        cloud_ids: Vec<String>,
    },
    UpdateResources {
        kind: ResourceKind,
        ids: Vec<String>,
    },
    DeleteResources {
        kind: ResourceKind,
        filter: ResourceFilter,
    },
    ListRelations {
        kind: ResourceKind,
        cvm_ids: Vec<String>,
    },
    CreateRelations {
        kind: ResourceKind,
        items: Vec<RelationCreate>,
    },
    DeleteRelations {
        kind: ResourceKind,
        ids: Vec<u64>,
    },
    UpsertRelations {
        kind: ResourceKind,
        upsert: RelationUpsert,
    },
    ListHosts {
        filter: HostFilter,
        page: Page,
    },
    CreateHosts {
        host_ids: Vec<i64>,
    },
    UpdateHosts {
        items: Vec<HostUpdate>,
    },
    DeleteHosts {
        filter: HostFilter,
    },
}

impl StoreOp {
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            StoreOp::ListResources { .. } | StoreOp::ListRelations { .. } | StoreOp::ListHosts { .. }
        )
    }
}

struct StoreInner {
    snapshot: StoreSnapshot,
    journal: Vec<StoreOp>,
    failing: Option<ResourceKind>,
}

/// A local inventory held in memory
///
/// Write calls larger than `max_batch` are rejected, so callers that forget
/// to chunk fail loudly. Deleting a resource also deletes its relation rows.
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    max_batch: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_snapshot(StoreSnapshot::default())
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                snapshot,
                journal: Vec::new(),
                failing: None,
            }),
            max_batch: BATCH_OPERATION_MAX,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        lock(&self.inner).snapshot.clone()
    }

    pub fn journal(&self) -> Vec<StoreOp> {
        lock(&self.inner).journal.clone()
    }

    pub fn writes(&self) -> Vec<StoreOp> {
        lock(&self.inner)
            .journal
            .iter()
            .filter(|op| op.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_journal(&self) {
        lock(&self.inner).journal.clear();
    }

    /// Make every call touching `kind` fail
    pub fn fail_on(&self, kind: Option<ResourceKind>) {
        lock(&self.inner).failing = kind;
    }

    /// All records of one kind, ordered by local id
    pub fn records(&self, kind: ResourceKind) -> Vec<ResourceRecord> {
        lock(&self.inner)
            .snapshot
            .resources
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn relations(&self, kind: ResourceKind) -> Vec<RelationRecord> {
        lock(&self.inner)
            .snapshot
            .relations
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    fn check_batch(&self, len: usize) -> Result<()> {
        if len > self.max_batch {
            return Err(SyncError::InvalidInput(format!(
                "batch of {} exceeds max {}",
                len, self.max_batch
            )));
        }
        Ok(())
    }
}

impl StoreInner {
    fn check(&self, kind: ResourceKind) -> Result<()> {
        if self.failing == Some(kind) {
            return Err(SyncError::Store(format!("{} request failed", kind)));
        }
        Ok(())
    }

    fn next_id(&mut self) -> String {
        self.snapshot.next_id += 1;
        format!("{:08x}", self.snapshot.next_id)
    }

    fn next_relation_id(&mut self) -> u64 {
        self.snapshot.next_relation_id += 1;
        self.snapshot.next_relation_id
    }

    fn remove_resources(&mut self, pred: impl Fn(&ResourceRecord) -> bool) -> usize {
        let removed: HashSet<String> = self
            .snapshot
            .resources
            .iter()
            .filter(|r| pred(r))
            .map(|r| r.id.clone())
            .collect();
        self.snapshot.resources.retain(|r| !removed.contains(&r.id));
        self.snapshot
            .relations
            .retain(|rel| !removed.contains(&rel.cvm_id) && !removed.contains(&rel.res_id));
        if !removed.is_empty() {
            self.snapshot.updated_at = Utc::now();
        }
        removed.len()
    }

    fn insert(&mut self, record: ResourceRecord) {
        self.snapshot.resources.push(record);
        self.snapshot.updated_at = Utc::now();
    }
}

fn page_of<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items.into_iter().skip(page.start).take(page.limit).collect()
}

#[async_trait]
impl DataService for MemoryStore {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        filter: &ResourceFilter,
        page: Page,
    ) -> Result<Vec<ResourceRecord>> {
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::ListResources {
            kind,
            filter: filter.clone(),
            page,
        });
        inner.check(kind)?;

        let mut matched: Vec<ResourceRecord> = inner
            .snapshot
            .resources
            .iter()
            .filter(|r| r.kind() == kind && filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(page_of(matched, page))
    }

    async fn batch_create_resources(
        &self,
        kind: ResourceKind,
        items: Vec<ResourceCreate>,
    ) -> Result<Vec<String>> {
        self.check_batch(items.len())?;
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::CreateResources {
            kind,
            cloud_ids: items.iter().map(|i| i.cloud.cloud_id.clone()).collect(),
        });
        inner.check(kind)?;

        for item in &items {
            if item.cloud.kind() != kind {
                return Err(SyncError::InvalidInput(format!(
                    "{} item {} in a {} batch",
                    item.cloud.kind(),
                    item.cloud.cloud_id,
                    kind
                )));
            }
            let duplicate = inner.snapshot.resources.iter().any(|r| {
                r.kind() == kind
                    && r.vendor == item.vendor
                    && r.account_id == item.account_id
                    && r.cloud_id == item.cloud.cloud_id
            });
            if duplicate {
                return Err(SyncError::Store(format!(
                    "{} {} already exists",
                    kind, item.cloud.cloud_id
                )));
            }
        }

        let now = Utc::now();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = inner.next_id();
            inner.insert(ResourceRecord {
                id: id.clone(),
                vendor: item.vendor,
                account_id: item.account_id,
                cloud_id: item.cloud.cloud_id,
                name: item.cloud.name,
                region: item.cloud.region,
                zone: item.cloud.zone,
                resource_group: item.cloud.resource_group,
                spec: item.cloud.spec,
                refs: item.refs,
                binding: HostBinding::default(),
                created_at: now,
                updated_at: now,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn batch_update_resources(
        &self,
        kind: ResourceKind,
        items: Vec<ResourceUpdate>,
    ) -> Result<()> {
        self.check_batch(items.len())?;
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::UpdateResources {
            kind,
            ids: items.iter().map(|i| i.id.clone()).collect(),
        });
        inner.check(kind)?;

        let known: HashSet<&str> = inner
            .snapshot
            .resources
            .iter()
            .filter(|r| r.kind() == kind)
            .map(|r| r.id.as_str())
            .collect();
        if let Some(missing) = items.iter().find(|i| !known.contains(i.id.as_str())) {
            return Err(SyncError::Store(format!("{} {} not found", kind, missing.id)));
        }

        let now = Utc::now();
        for item in items {
            if let Some(rec) = inner
                .snapshot
                .resources
                .iter_mut()
                .find(|r| r.id == item.id)
            {
                rec.name = item.cloud.name;
                rec.region = item.cloud.region;
                rec.zone = item.cloud.zone;
                rec.resource_group = item.cloud.resource_group;
                rec.spec = item.cloud.spec;
                rec.refs = item.refs;
                rec.updated_at = now;
            }
        }
        inner.snapshot.updated_at = now;
        Ok(())
    }

    async fn batch_delete_resources(
        &self,
        kind: ResourceKind,
        filter: &ResourceFilter,
    ) -> Result<()> {
        if filter.is_unbounded() {
            return Err(SyncError::InvalidInput(
                "refusing to delete with an empty filter".into(),
            ));
        }
        if let Some(ids) = &filter.cloud_ids {
            self.check_batch(ids.len())?;
        }
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::DeleteResources {
            kind,
            filter: filter.clone(),
        });
        inner.check(kind)?;

        inner.remove_resources(|r| r.kind() == kind && filter.matches(r));
        Ok(())
    }

    async fn list_relations(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
        cvm_ids: &[String],
    ) -> Result<Vec<RelationRecord>> {
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::ListRelations {
            kind,
            cvm_ids: cvm_ids.to_vec(),
        });
        inner.check(kind)?;

        let mut rows: Vec<RelationRecord> = inner
            .snapshot
            .relations
            .iter()
            .filter(|r| r.vendor == vendor && r.kind == kind && cvm_ids.contains(&r.cvm_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (&a.cvm_id, a.priority, a.id).cmp(&(&b.cvm_id, b.priority, b.id))
        });
        Ok(rows)
    }

    async fn batch_create_relations(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
        items: Vec<RelationCreate>,
    ) -> Result<Vec<u64>> {
        self.check_batch(items.len())?;
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::CreateRelations {
            kind,
            items: items.clone(),
        });
        inner.check(kind)?;

        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let exists = inner.snapshot.relations.iter().any(|r| {
                r.vendor == vendor
                    && r.kind == kind
                    && r.cvm_id == item.cvm_id
                    && r.res_id == item.res_id
            });
            if exists {
                return Err(SyncError::Store(format!(
                    "{} relation {} -> {} already exists",
                    kind, item.cvm_id, item.res_id
                )));
            }
            let id = inner.next_relation_id();
            inner.snapshot.relations.push(RelationRecord {
                id,
                vendor,
                kind,
                cvm_id: item.cvm_id,
                res_id: item.res_id,
                priority: item.priority,
            });
            ids.push(id);
        }
        inner.snapshot.updated_at = Utc::now();
        Ok(ids)
    }

    async fn batch_delete_relations(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
        ids: &[u64],
    ) -> Result<()> {
        if ids.is_empty() {
            return Err(SyncError::InvalidInput(
                "refusing to delete with an empty filter".into(),
            ));
        }
        self.check_batch(ids.len())?;
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::DeleteRelations {
            kind,
            ids: ids.to_vec(),
        });
        inner.check(kind)?;

        inner
            .snapshot
            .relations
            .retain(|r| !(r.vendor == vendor && r.kind == kind && ids.contains(&r.id)));
        inner.snapshot.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_relations(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
        upsert: RelationUpsert,
    ) -> Result<()> {
        self.check_batch(upsert.creates.len())?;
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::UpsertRelations {
            kind,
            upsert: upsert.clone(),
        });
        inner.check(kind)?;

        for delete in &upsert.deletes {
            inner.snapshot.relations.retain(|r| {
                !(r.vendor == vendor
                    && r.kind == kind
                    && r.cvm_id == delete.cvm_id
                    && !delete.keep_ids.contains(&r.id))
            });
        }
        for item in upsert.creates {
            let id = inner.next_relation_id();
            inner.snapshot.relations.push(RelationRecord {
                id,
                vendor,
                kind,
                cvm_id: item.cvm_id,
                res_id: item.res_id,
                priority: item.priority,
            });
        }
        inner.snapshot.updated_at = Utc::now();
        Ok(())
    }

    async fn list_hosts(&self, filter: &HostFilter, page: Page) -> Result<Vec<HostRecord>> {
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::ListHosts {
            filter: filter.clone(),
            page,
        });
        inner.check(ResourceKind::Cvm)?;

        let mut hosts: Vec<HostRecord> = inner
            .snapshot
            .resources
            .iter()
            .filter_map(HostRecord::from_record)
            .filter(|h| filter.matches(h))
            .collect();
        hosts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(page_of(hosts, page))
    }

    async fn batch_create_hosts(&self, items: Vec<HostCreate>) -> Result<Vec<String>> {
        self.check_batch(items.len())?;
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::CreateHosts {
            host_ids: items.iter().map(|h| h.host_id).collect(),
        });
        inner.check(ResourceKind::Cvm)?;

        let now = Utc::now();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = inner.next_id();
            inner.insert(ResourceRecord {
                id: id.clone(),
                vendor: Vendor::Other,
                account_id: item.account_id,
                cloud_id: item.cloud_id,
                name: item.name,
                region: item.region,
                zone: None,
                resource_group: None,
                spec: ResourceSpec::Cvm(CvmSpec {
                    private_ipv4: item.private_ipv4,
                    public_ipv4: item.public_ipv4,
                    private_ipv6: item.private_ipv6,
                    public_ipv6: item.public_ipv6,
                    ..Default::default()
                }),
                refs: Vec::new(),
                binding: HostBinding {
                    host_id: Some(item.host_id),
                    biz_id: item.biz_id,
                    cloud_area_id: item.cloud_area_id,
                },
                created_at: now,
                updated_at: now,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn batch_update_hosts(&self, items: Vec<HostUpdate>) -> Result<()> {
        self.check_batch(items.len())?;
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::UpdateHosts {
            items: items.clone(),
        });
        inner.check(ResourceKind::Cvm)?;

        let now = Utc::now();
        for item in items {
            let rec = inner
                .snapshot
                .resources
                .iter_mut()
                .find(|r| r.id == item.id && r.kind() == ResourceKind::Cvm)
                .ok_or_else(|| SyncError::Store(format!("host {} not found", item.id)))?;

            if let Some(host_id) = item.host_id {
                rec.binding.host_id = Some(host_id);
            }
            if let Some(biz_id) = item.biz_id {
                rec.binding.biz_id = biz_id;
            }
            if let Some(area) = item.cloud_area_id {
                rec.binding.cloud_area_id = area;
            }
            if let Some(name) = item.name {
                rec.name = name;
            }
            if let ResourceSpec::Cvm(cvm) = &mut rec.spec {
                if let Some(ips) = item.private_ipv4 {
                    cvm.private_ipv4 = ips;
                }
                if let Some(ips) = item.public_ipv4 {
                    cvm.public_ipv4 = ips;
                }
                if let Some(ips) = item.private_ipv6 {
                    cvm.private_ipv6 = ips;
                }
                if let Some(ips) = item.public_ipv6 {
                    cvm.public_ipv6 = ips;
                }
            }
            rec.updated_at = now;
        }
        inner.snapshot.updated_at = now;
        Ok(())
    }

    async fn batch_delete_hosts(&self, filter: &HostFilter) -> Result<()> {
        if filter.is_unbounded() {
            return Err(SyncError::InvalidInput(
                "refusing to delete with an empty filter".into(),
            ));
        }
        let mut inner = lock(&self.inner);
        inner.journal.push(StoreOp::DeleteHosts {
            filter: filter.clone(),
        });
        inner.check(ResourceKind::Cvm)?;

        inner.remove_resources(|r| {
            HostRecord::from_record(r).is_some_and(|host| filter.matches(&host))
        });
        Ok(())
    }
}

/// An external host inventory held in memory
#[derive(Default)]
pub struct MemoryHostSource {
    hosts: Mutex<Vec<ExternalHost>>,
    queried: Mutex<Vec<Vec<i64>>>,
}

impl MemoryHostSource {
    pub fn new(hosts: Vec<ExternalHost>) -> Self {
        Self {
            hosts: Mutex::new(hosts),
            queried: Mutex::new(Vec::new()),
        }
    }

    /// Host id sets requested so far, one entry per call
    pub fn queried(&self) -> Vec<Vec<i64>> {
        lock(&self.queried).clone()
    }
}

#[async_trait]
impl HostSource for MemoryHostSource {
    async fn list_hosts(&self, host_ids: &[i64]) -> Result<Vec<ExternalHost>> {
        lock(&self.queried).push(host_ids.to_vec());
        Ok(lock(&self.hosts)
            .iter()
            .filter(|h| host_ids.contains(&h.host_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiskSpec, RelationDeleteFilter};

    fn disk(id: &str) -> CloudResource {
        CloudResource::new(id, id, ResourceSpec::Disk(DiskSpec::default())).with_region("r1")
    }

    fn create(id: &str) -> ResourceCreate {
        ResourceCreate {
            vendor: Vendor::TCloud,
            account_id: "acc".into(),
            cloud: disk(id),
            refs: vec![],
        }
    }

    #[tokio::test]
    async fn test_cloud_list_filters_by_kind_and_scope() {
        let cloud = MemoryCloud::new(Vendor::TCloud, vec![disk("d-1"), disk("d-2")]);
        let all = cloud
            .list(ResourceKind::Disk, &ListOption::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let some = cloud
            .list(
                ResourceKind::Disk,
                &ListOption::new().with_cloud_ids(vec!["d-2".into()]),
            )
            .await
            .unwrap();
        assert_eq!(some.len(), 1);
        assert!(
            cloud
                .list(ResourceKind::Eip, &ListOption::new())
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(cloud.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_cloud_failure_injection() {
        let cloud = MemoryCloud::new(Vendor::Aws, vec![disk("d-1")]);
        cloud.fail_on(Some(ResourceKind::Disk));
        let err = cloud
            .list(ResourceKind::Disk, &ListOption::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_store_create_list_and_page() {
        let store = MemoryStore::new();
        let ids = store
            .batch_create_resources(
                ResourceKind::Disk,
                vec![create("d-1"), create("d-2"), create("d-3")],
            )
            .await
            .unwrap();
        assert_eq!(ids, vec!["00000001", "00000002", "00000003"]);

        let filter = ResourceFilter::new(Vendor::TCloud, "acc");
        let page = store
            .list_resources(ResourceKind::Disk, &filter, Page::new(1, 1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].cloud_id, "d-2");

        let dup = store
            .batch_create_resources(ResourceKind::Disk, vec![create("d-1")])
            .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_store_rejects_oversized_batches() {
        let store = MemoryStore::new().with_max_batch(1);
        let err = store
            .batch_create_resources(ResourceKind::Disk, vec![create("d-1"), create("d-2")])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_store_delete_cascades_to_relations() {
        let store = MemoryStore::new();
        let ids = store
            .batch_create_resources(ResourceKind::Disk, vec![create("d-1"), create("d-2")])
            .await
            .unwrap();
        store
            .batch_create_relations(
                Vendor::TCloud,
                ResourceKind::Disk,
                vec![
                    RelationCreate::new("vm", ids[0].clone()),
                    RelationCreate::new("vm", ids[1].clone()),
                ],
            )
            .await
            .unwrap();

        let filter =
            ResourceFilter::new(Vendor::TCloud, "acc").with_cloud_ids(vec!["d-1".into()]);
        store
            .batch_delete_resources(ResourceKind::Disk, &filter)
            .await
            .unwrap();

        let rels = store.relations(ResourceKind::Disk);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].res_id, ids[1]);

        assert!(
            store
                .batch_delete_resources(ResourceKind::Disk, &ResourceFilter::default())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_upsert_deletes_before_creating() {
        let store = MemoryStore::new();
        store
            .batch_create_relations(
                Vendor::TCloud,
                ResourceKind::SecurityGroup,
                vec![
                    RelationCreate::new("vm", "a").with_priority(1),
                    RelationCreate::new("vm", "b").with_priority(2),
                ],
            )
            .await
            .unwrap();

        let kept = store
            .list_relations(Vendor::TCloud, ResourceKind::SecurityGroup, &["vm".into()])
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.res_id == "a")
            .unwrap()
            .id;
        store
            .upsert_relations(
                Vendor::TCloud,
                ResourceKind::SecurityGroup,
                RelationUpsert {
                    deletes: vec![RelationDeleteFilter {
                        cvm_id: "vm".into(),
                        keep_ids: vec![kept],
                    }],
                    creates: vec![RelationCreate::new("vm", "c").with_priority(2)],
                },
            )
            .await
            .unwrap();

        let rows = store
            .list_relations(Vendor::TCloud, ResourceKind::SecurityGroup, &["vm".into()])
            .await
            .unwrap();
        let got: Vec<(&str, Option<u32>)> = rows
            .iter()
            .map(|r| (r.res_id.as_str(), r.priority))
            .collect();
        assert_eq!(got, vec![("a", Some(1)), ("c", Some(2))]);
    }

    #[tokio::test]
    async fn test_hosts_are_instance_rows() {
        let store = MemoryStore::new();
        let ids = store
            .batch_create_hosts(vec![HostCreate {
                account_id: "acc".into(),
                cloud_id: "_cmdb_7".into(),
                name: "h7".into(),
                host_id: 7,
                biz_id: 3,
                cloud_area_id: 0,
                region: None,
                private_ipv4: vec!["10.0.0.7".into()],
                public_ipv4: vec![],
                private_ipv6: vec![],
                public_ipv6: vec![],
            }])
            .await
            .unwrap();

        let cvms = store.records(ResourceKind::Cvm);
        assert_eq!(cvms.len(), 1);
        assert_eq!(cvms[0].vendor, Vendor::Other);

        store
            .batch_update_hosts(vec![HostUpdate {
                name: Some("renamed".into()),
                ..HostUpdate::new(ids[0].clone())
            }])
            .await
            .unwrap();

        let hosts = store
            .list_hosts(&HostFilter::by_host_ids(vec![7]), Page::first(10))
            .await
            .unwrap();
        assert_eq!(hosts[0].name, "renamed");
        assert_eq!(hosts[0].private_ipv4, vec!["10.0.0.7"]);

        store
            .batch_delete_hosts(&HostFilter::by_host_ids(vec![7]).with_vendor(Vendor::Other))
            .await
            .unwrap();
        assert!(store.records(ResourceKind::Cvm).is_empty());
    }

    #[tokio::test]
    async fn test_journal_separates_writes() {
        let store = MemoryStore::new();
        store
            .list_resources(
                ResourceKind::Disk,
                &ResourceFilter::new(Vendor::Aws, "acc"),
                Page::first(10),
            )
            .await
            .unwrap();
        assert_eq!(store.journal().len(), 1);
        assert!(store.writes().is_empty());
    }
}

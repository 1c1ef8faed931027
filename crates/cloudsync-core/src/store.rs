//! Local-store capability contract

use crate::error::Result;
use crate::model::{
    CloudResource, HostCreate, HostRecord, HostUpdate, RelationCreate, RelationRecord,
    RelationUpsert, ResourceKind, ResourceRecord, ResourceRef, Vendor,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Batched CRUD access to the persisted inventory ("data service")
///
/// Every call is scoped by an explicit filter. List calls are paginated:
/// a page shorter than `page.limit` marks the end of the data.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        filter: &ResourceFilter,
        page: Page,
    ) -> Result<Vec<ResourceRecord>>;

    /// Returns the local ids assigned, in input order
    async fn batch_create_resources(
        &self,
        kind: ResourceKind,
        items: Vec<ResourceCreate>,
    ) -> Result<Vec<String>>;

    async fn batch_update_resources(
        &self,
        kind: ResourceKind,
        items: Vec<ResourceUpdate>,
    ) -> Result<()>;

    async fn batch_delete_resources(&self, kind: ResourceKind, filter: &ResourceFilter)
    -> Result<()>;

    /// Relation rows of one kind owned by any of the given instances
    async fn list_relations(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
        cvm_ids: &[String],
    ) -> Result<Vec<RelationRecord>>;

    async fn batch_create_relations(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
        items: Vec<RelationCreate>,
    ) -> Result<Vec<u64>>;

    async fn batch_delete_relations(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
        ids: &[u64],
    ) -> Result<()>;

    /// Delete-then-create in one call
    async fn upsert_relations(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
        upsert: RelationUpsert,
    ) -> Result<()>;

    /// Host view over instance rows of every vendor
    async fn list_hosts(&self, filter: &HostFilter, page: Page) -> Result<Vec<HostRecord>>;

    async fn batch_create_hosts(&self, items: Vec<HostCreate>) -> Result<Vec<String>>;

    async fn batch_update_hosts(&self, items: Vec<HostUpdate>) -> Result<()>;

    async fn batch_delete_hosts(&self, filter: &HostFilter) -> Result<()>;
}

/// Pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub start: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(start: usize, limit: usize) -> Self {
        Self { start, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self { start: 0, limit }
    }
}

/// Filter over resource records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<Vendor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_cloud_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_cloud_id: Option<String>,
}

impl ResourceFilter {
    pub fn new(vendor: Vendor, account_id: impl Into<String>) -> Self {
        Self {
            vendor: Some(vendor),
            account_id: Some(account_id.into()),
            ..Default::default()
        }
    }

    pub fn with_cloud_ids(mut self, ids: Vec<String>) -> Self {
        self.cloud_ids = Some(ids);
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_zone(mut self, zone: Option<String>) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_resource_group(mut self, group: Option<String>) -> Self {
        self.resource_group = group;
        self
    }

    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent_cloud_id = parent;
        self
    }

    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner_cloud_id = owner;
        self
    }

    /// A filter with no condition at all would match the whole table
    pub fn is_unbounded(&self) -> bool {
        self.vendor.is_none() && self.account_id.is_none() && self.cloud_ids.is_none()
    }

    pub fn matches(&self, rec: &ResourceRecord) -> bool {
        fn eq(want: &Option<String>, have: Option<&str>) -> bool {
            want.as_deref().is_none_or(|w| have == Some(w))
        }
        fn located(want: &Option<String>, have: Option<&str>) -> bool {
            have.is_none() || eq(want, have)
        }

        self.vendor.is_none_or(|v| v == rec.vendor)
            && eq(&self.account_id, Some(rec.account_id.as_str()))
            && self
                .cloud_ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| id == &rec.cloud_id))
            && located(&self.region, rec.region.as_deref())
            && located(&self.zone, rec.zone.as_deref())
            && eq(&self.resource_group, rec.resource_group.as_deref())
            && eq(&self.parent_cloud_id, rec.spec.parent_cloud_id())
            && eq(&self.owner_cloud_id, rec.spec.owner_cloud_id())
    }
}

/// Filter over host rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<Vendor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biz_id: Option<i64>,
}

impl HostFilter {
    pub fn by_host_ids(ids: Vec<i64>) -> Self {
        Self {
            host_ids: Some(ids),
            ..Default::default()
        }
    }

    pub fn by_cloud_ids(vendor: Vendor, ids: Vec<String>) -> Self {
        Self {
            vendor: Some(vendor),
            cloud_ids: Some(ids),
            ..Default::default()
        }
    }

    pub fn by_biz(biz_id: i64) -> Self {
        Self {
            biz_id: Some(biz_id),
            ..Default::default()
        }
    }

    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = Some(vendor);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.host_ids.is_none() && self.cloud_ids.is_none() && self.biz_id.is_none()
    }

    pub fn matches(&self, host: &HostRecord) -> bool {
        self.host_ids
            .as_ref()
            .is_none_or(|ids| host.host_id.is_some_and(|h| ids.contains(&h)))
            && self.vendor.is_none_or(|v| v == host.vendor)
            && self
                .cloud_ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| id == &host.cloud_id))
            && self.biz_id.is_none_or(|b| b == host.biz_id)
    }
}

/// New resource row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCreate {
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud: CloudResource,
    #[serde(default)]
    pub refs: Vec<ResourceRef>,
}

/// Full replacement of the provider-sourced fields of a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    /// Local id of the row
    pub id: String,
    pub cloud: CloudResource,
    #[serde(default)]
    pub refs: Vec<ResourceRef>,
}

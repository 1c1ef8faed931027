//! Vendor capability matrix and per-vendor sync profiles

use crate::error::{Result, SyncError};
use crate::model::{ResourceKind, Vendor};
use std::collections::BTreeMap;

/// Relation kinds an instance of each vendor can hold
const CVM_RELATIONS: &[(Vendor, &[ResourceKind])] = &[
    (
        Vendor::TCloud,
        &[
            ResourceKind::SecurityGroup,
            ResourceKind::Disk,
            ResourceKind::Eip,
        ],
    ),
    (
        Vendor::Aws,
        &[
            ResourceKind::SecurityGroup,
            ResourceKind::Disk,
            ResourceKind::Eip,
        ],
    ),
    (
        Vendor::Gcp,
        &[
            ResourceKind::Disk,
            ResourceKind::Eip,
            ResourceKind::NetworkInterface,
        ],
    ),
    (
        Vendor::HuaWei,
        &[
            ResourceKind::SecurityGroup,
            ResourceKind::Disk,
            ResourceKind::Eip,
            ResourceKind::NetworkInterface,
        ],
    ),
    (
        Vendor::Azure,
        &[
            ResourceKind::SecurityGroup,
            ResourceKind::Disk,
            ResourceKind::Eip,
            ResourceKind::NetworkInterface,
        ],
    ),
];

/// Relation kinds supported for `vendor`, in sync order
pub fn cvm_relation_kinds(vendor: Vendor) -> Result<&'static [ResourceKind]> {
    CVM_RELATIONS
        .iter()
        .find(|(v, _)| *v == vendor)
        .map(|(_, kinds)| *kinds)
        .ok_or_else(|| SyncError::Unsupported(format!("vendor: {} not support", vendor)))
}

/// Fail fast unless `vendor` instances can be related to `kind`
pub fn ensure_cvm_relation(vendor: Vendor, kind: ResourceKind) -> Result<()> {
    if cvm_relation_kinds(vendor)?.contains(&kind) {
        Ok(())
    } else {
        Err(SyncError::UnsupportedRelation { vendor, kind })
    }
}

/// How a vendor shards its list calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    None,
    /// Every list call is scoped to one resource group
    ResourceGroup,
}

/// How network interfaces are exposed by a vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceModel {
    /// Not mirrored
    None,
    /// Listed per owning instance
    PerInstance,
    /// A first-class resource listed by id
    Standalone,
}

/// Vendor-specific shape of the lifecycle sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorProfile {
    pub vendor: Vendor,
    pub partition: Partition,
    /// Subnets can only be listed under their VPC
    pub subnet_scoped_by_vpc: bool,
    pub interfaces: InterfaceModel,
    /// Max ids per id-filtered list call
    pub query_limit: usize,
}

impl VendorProfile {
    pub fn of(vendor: Vendor) -> Result<Self> {
        let (partition, subnet_scoped_by_vpc, interfaces, query_limit) = match vendor {
            Vendor::TCloud => (Partition::None, false, InterfaceModel::None, 100),
            Vendor::Aws => (Partition::None, false, InterfaceModel::None, 200),
            Vendor::Gcp => (Partition::None, false, InterfaceModel::PerInstance, 500),
            Vendor::HuaWei => (Partition::None, true, InterfaceModel::PerInstance, 60),
            Vendor::Azure => (Partition::ResourceGroup, true, InterfaceModel::Standalone, 500),
            Vendor::Other => {
                return Err(SyncError::Unsupported(format!(
                    "vendor: {} not support",
                    vendor
                )));
            }
        };
        Ok(Self {
            vendor,
            partition,
            subnet_scoped_by_vpc,
            interfaces,
            query_limit,
        })
    }

    /// Chunk size for id-filtered cloud calls
    pub fn chunk_size(&self, cloud_resource_sync_max: usize) -> usize {
        self.query_limit.min(cloud_resource_sync_max).max(1)
    }

    pub fn supports_relation(&self, kind: ResourceKind) -> bool {
        ensure_cvm_relation(self.vendor, kind).is_ok()
    }
}

/// Resource group named in an Azure-style id, lower case
pub fn resource_group_of(cloud_id: &str) -> Result<String> {
    const MARKER: &str = "resourcegroups/";
    let lower = cloud_id.to_lowercase();
    let start = lower
        .find(MARKER)
        .map(|i| i + MARKER.len())
        .ok_or_else(|| SyncError::InvalidInput(format!("no resource group in id: {}", cloud_id)))?;
    let rest = &lower[start..];
    let name = rest.split('/').next().unwrap_or_default();
    if name.is_empty() {
        return Err(SyncError::InvalidInput(format!(
            "empty resource group in id: {}",
            cloud_id
        )));
    }
    Ok(name.to_string())
}

/// Group ids by resource group, preserving first-seen order within a group
pub fn group_by_resource_group<'a, I>(ids: I) -> Result<BTreeMap<String, Vec<String>>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for id in ids {
        let group = resource_group_of(id)?;
        let entry = groups.entry(group).or_default();
        if !entry.contains(id) {
            entry.push(id.clone());
        }
    }
    Ok(groups)
}

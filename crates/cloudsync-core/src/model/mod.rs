//! Data model shared by the engine, the provider contracts and the store

mod host;
mod relation;
mod resource;

pub use host::{
    ExternalHost, HostBinding, HostCreate, HostRecord, HostUpdate, UNASSIGNED_BIZ, split_ips,
};
pub use relation::{RelationCreate, RelationDeleteFilter, RelationRecord, RelationUpsert};
pub use resource::{
    AttachedDisk, AttachedInterface, CloudResource, CvmSpec, DiskSpec, EipSpec, FirewallSpec,
    NetworkInterfaceSpec, RegionSpec, ResourceRecord, ResourceRef, ResourceSpec,
    SecurityGroupSpec, SubAccountSpec, SubnetSpec, VpcSpec, ZoneSpec,
};

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cloud vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    TCloud,
    Aws,
    Gcp,
    HuaWei,
    Azure,
    /// Hosts whose authoritative source is the external CMDB
    Other,
}

impl Vendor {
    pub const ALL: [Vendor; 6] = [
        Vendor::TCloud,
        Vendor::Aws,
        Vendor::Gcp,
        Vendor::HuaWei,
        Vendor::Azure,
        Vendor::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::TCloud => "tcloud",
            Vendor::Aws => "aws",
            Vendor::Gcp => "gcp",
            Vendor::HuaWei => "huawei",
            Vendor::Azure => "azure",
            Vendor::Other => "other",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vendor::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SyncError::InvalidInput(format!("unknown vendor: {}", s)))
    }
}

/// Kind of cloud resource mirrored into the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    Disk,
    Eip,
    NetworkInterface,
    SecurityGroup,
    Cvm,
    Region,
    Zone,
    Firewall,
    SubAccount,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Vpc,
        ResourceKind::Subnet,
        ResourceKind::Disk,
        ResourceKind::Eip,
        ResourceKind::NetworkInterface,
        ResourceKind::SecurityGroup,
        ResourceKind::Cvm,
        ResourceKind::Region,
        ResourceKind::Zone,
        ResourceKind::Firewall,
        ResourceKind::SubAccount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Disk => "disk",
            ResourceKind::Eip => "eip",
            ResourceKind::NetworkInterface => "network_interface",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::Cvm => "cvm",
            ResourceKind::Region => "region",
            ResourceKind::Zone => "zone",
            ResourceKind::Firewall => "firewall",
            ResourceKind::SubAccount => "sub_account",
        }
    }

    /// Whether a cvm can hold relation rows towards this kind
    pub fn is_cvm_relation(&self) -> bool {
        matches!(
            self,
            ResourceKind::Disk
                | ResourceKind::Eip
                | ResourceKind::NetworkInterface
                | ResourceKind::SecurityGroup
        )
    }

    /// Whether the relation rows of this kind carry a meaningful priority
    pub fn is_ordered_relation(&self) -> bool {
        matches!(self, ResourceKind::SecurityGroup)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| SyncError::InvalidInput(format!("unknown resource kind: {}", s)))
    }
}

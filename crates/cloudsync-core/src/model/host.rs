//! Host rows and the external host inventory

use super::{ResourceRecord, Vendor};
use serde::{Deserialize, Serialize};

/// Business id of hosts not assigned to any business
pub const UNASSIGNED_BIZ: i64 = -1;

/// External host binding carried by instance records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBinding {
    /// External host id, `None` while unbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<i64>,
    #[serde(default = "unassigned_biz")]
    pub biz_id: i64,
    #[serde(default)]
    pub cloud_area_id: i64,
}

fn unassigned_biz() -> i64 {
    UNASSIGNED_BIZ
}

impl Default for HostBinding {
    fn default() -> Self {
        Self {
            host_id: None,
            biz_id: UNASSIGNED_BIZ,
            cloud_area_id: 0,
        }
    }
}

/// Host view over a local instance record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: String,
    pub vendor: Vendor,
    pub cloud_id: String,
    pub name: String,
    pub host_id: Option<i64>,
    pub biz_id: i64,
    pub cloud_area_id: i64,
    pub region: Option<String>,
    pub private_ipv4: Vec<String>,
    pub public_ipv4: Vec<String>,
    pub private_ipv6: Vec<String>,
    pub public_ipv6: Vec<String>,
}

impl HostRecord {
    /// Projects an instance record; other kinds have no host view
    pub fn from_record(record: &ResourceRecord) -> Option<Self> {
        let cvm = record.as_cvm()?;
        Some(Self {
            id: record.id.clone(),
            vendor: record.vendor,
            cloud_id: record.cloud_id.clone(),
            name: record.name.clone(),
            host_id: record.binding.host_id,
            biz_id: record.binding.biz_id,
            cloud_area_id: record.binding.cloud_area_id,
            region: record.region.clone(),
            private_ipv4: cvm.private_ipv4.clone(),
            public_ipv4: cvm.public_ipv4.clone(),
            private_ipv6: cvm.private_ipv6.clone(),
            public_ipv6: cvm.public_ipv6.clone(),
        })
    }
}

/// New host row sourced from the external inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCreate {
    pub account_id: String,
    pub cloud_id: String,
    pub name: String,
    pub host_id: i64,
    pub biz_id: i64,
    pub cloud_area_id: i64,
    pub region: Option<String>,
    pub private_ipv4: Vec<String>,
    pub public_ipv4: Vec<String>,
    pub private_ipv6: Vec<String>,
    pub public_ipv6: Vec<String>,
}

/// Partial update of a host row; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biz_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_area_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ipv4: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ipv4: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ipv6: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ipv6: Option<Vec<String>>,
}

impl HostUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Update that only binds the external host id
    pub fn bind(id: impl Into<String>, host_id: i64) -> Self {
        Self {
            id: id.into(),
            host_id: Some(host_id),
            ..Default::default()
        }
    }
}

/// A host as reported by the external inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalHost {
    pub host_id: i64,
    #[serde(default = "unassigned_biz")]
    pub biz_id: i64,
    #[serde(default)]
    pub name: String,
    /// Comma separated address lists, as the inventory reports them
    #[serde(default)]
    pub inner_ipv4: String,
    #[serde(default)]
    pub outer_ipv4: String,
    #[serde(default)]
    pub inner_ipv6: String,
    #[serde(default)]
    pub outer_ipv6: String,
    /// Vendor and instance id when the host is a known cloud instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_vendor: Option<Vendor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_inst_id: Option<String>,
    #[serde(default)]
    pub cloud_area_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl ExternalHost {
    pub fn new(host_id: i64, biz_id: i64, name: impl Into<String>) -> Self {
        Self {
            host_id,
            biz_id,
            name: name.into(),
            inner_ipv4: String::new(),
            outer_ipv4: String::new(),
            inner_ipv6: String::new(),
            outer_ipv6: String::new(),
            cloud_vendor: None,
            cloud_inst_id: None,
            cloud_area_id: 0,
            region: None,
        }
    }

    pub fn with_inner_ipv4(mut self, ips: impl Into<String>) -> Self {
        self.inner_ipv4 = ips.into();
        self
    }

    pub fn with_outer_ipv4(mut self, ips: impl Into<String>) -> Self {
        self.outer_ipv4 = ips.into();
        self
    }

    pub fn with_cloud_instance(mut self, vendor: Vendor, cloud_id: impl Into<String>) -> Self {
        self.cloud_vendor = Some(vendor);
        self.cloud_inst_id = Some(cloud_id.into());
        self
    }

    /// (vendor, instance id) fallback key, when both are known
    pub fn cloud_key(&self) -> Option<(Vendor, &str)> {
        match (self.cloud_vendor, self.cloud_inst_id.as_deref()) {
            (Some(vendor), Some(id)) if !id.is_empty() => Some((vendor, id)),
            _ => None,
        }
    }
}

/// Splits a comma separated address list, dropping empty entries
pub fn split_ips(ips: &str) -> Vec<String> {
    ips.split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
        .collect()
}

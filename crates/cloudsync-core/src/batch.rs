//! Batch limits and the parameters scoping one sync invocation

use crate::error::{Result, SyncError};
use crate::model::Vendor;
use crate::provider::ListOption;
use crate::store::ResourceFilter;
use serde::{Deserialize, Serialize};

/// Max items per store write call
pub const BATCH_OPERATION_MAX: usize = 100;

/// Max cloud ids accepted by one sync invocation
pub const CLOUD_RESOURCE_SYNC_MAX: usize = 500;

/// Default page size of store list calls
pub const DEFAULT_PAGE_LIMIT: usize = 500;

/// Worker cap of the per-instance fan-out
pub const SYNC_CONCURRENCY: usize = 10;

/// Tunable limits, usually loaded from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncLimits {
    pub batch_operation_max: usize,
    pub cloud_resource_sync_max: usize,
    pub page_limit: usize,
    pub concurrency: usize,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            batch_operation_max: BATCH_OPERATION_MAX,
            cloud_resource_sync_max: CLOUD_RESOURCE_SYNC_MAX,
            page_limit: DEFAULT_PAGE_LIMIT,
            concurrency: SYNC_CONCURRENCY,
        }
    }
}

impl SyncLimits {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("batch_operation_max", self.batch_operation_max),
            ("cloud_resource_sync_max", self.cloud_resource_sync_max),
            ("page_limit", self.page_limit),
            ("concurrency", self.concurrency),
        ] {
            if value == 0 {
                return Err(SyncError::InvalidInput(format!("{} must be positive", name)));
            }
        }
        if self.batch_operation_max > self.page_limit {
            return Err(SyncError::InvalidInput(format!(
                "batch_operation_max {} exceeds page_limit {}",
                self.batch_operation_max, self.page_limit
            )));
        }
        Ok(())
    }
}

/// Account, scope and cloud id subset of one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBaseParams {
    pub account_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,

    /// Parent container for parent-scoped kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_cloud_id: Option<String>,

    /// Explicit cloud ids; `None` syncs the whole scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_ids: Option<Vec<String>>,
}

impl SyncBaseParams {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_resource_group(mut self, group: impl Into<String>) -> Self {
        self.resource_group = Some(group.into().to_lowercase());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_cloud_id = Some(parent.into());
        self
    }

    pub fn with_cloud_ids(mut self, ids: Vec<String>) -> Self {
        self.cloud_ids = Some(ids);
        self
    }

    /// Reject parameters before any network call is made
    pub fn validate(&self, limits: &SyncLimits) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(SyncError::InvalidInput("account_id is required".into()));
        }
        if let Some(ids) = &self.cloud_ids {
            if ids.is_empty() {
                return Err(SyncError::InvalidInput("cloud_ids must not be empty".into()));
            }
            if ids.len() > limits.cloud_resource_sync_max {
                return Err(SyncError::InvalidInput(format!(
                    "cloud_ids should <= {}, got {}",
                    limits.cloud_resource_sync_max,
                    ids.len()
                )));
            }
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(SyncError::InvalidInput("cloud_ids contains an empty id".into()));
            }
        }
        Ok(())
    }

    /// Cloud list scope, without the id subset
    pub fn list_option(&self) -> ListOption {
        ListOption {
            region: self.region.clone(),
            zone: self.zone.clone(),
            resource_group: self.resource_group.clone(),
            parent_cloud_id: self.parent_cloud_id.clone(),
            owner_cloud_id: None,
            cloud_ids: None,
        }
    }

    /// Store filter for the same scope, without the id subset
    pub fn filter(&self, vendor: Vendor) -> ResourceFilter {
        ResourceFilter::new(vendor, self.account_id.clone())
            .with_region(self.region.clone())
            .with_zone(self.zone.clone())
            .with_resource_group(self.resource_group.clone())
            .with_parent(self.parent_cloud_id.clone())
    }
}

/// Split `items` into chunks of at most `size`
pub fn chunks<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

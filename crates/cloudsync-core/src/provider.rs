//! Cloud-side capability contracts

use crate::error::Result;
use crate::model::{CloudResource, ExternalHost, ResourceKind, Vendor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Read access to one cloud account
///
/// Vendor API clients (TCloud, AWS, GCP, HuaWei, Azure) implement this
/// trait; the engine only ever lists. Implementations are bound to a single
/// account and translate `ListOption` into the provider's own query.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Vendor this client talks to
    fn vendor(&self) -> Vendor;

    /// List resources of one kind.
    ///
    /// When `opt.cloud_ids` is set the result must be restricted to those ids;
    /// the deletion guard depends on it.
    async fn list(&self, kind: ResourceKind, opt: &ListOption) -> Result<Vec<CloudResource>>;
}

/// Scope of a cloud list call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,

    /// Parent container (e.g. the VPC of a subnet)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_cloud_id: Option<String>,

    /// Owning instance for instance-scoped kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_cloud_id: Option<String>,

    /// Explicit id subset; `None` lists the whole scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_ids: Option<Vec<String>>,
}

impl ListOption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
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

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_cloud_id = Some(owner.into());
        self
    }

    pub fn with_cloud_ids(mut self, ids: Vec<String>) -> Self {
        self.cloud_ids = Some(ids);
        self
    }

    /// Whether a resource falls inside this scope
    pub fn matches(&self, res: &CloudResource) -> bool {
        fn eq(want: &Option<String>, have: Option<&str>) -> bool {
            want.as_deref().is_none_or(|w| have == Some(w))
        }
        // global resources carry no region or zone and match any
        fn located(want: &Option<String>, have: Option<&str>) -> bool {
            have.is_none() || eq(want, have)
        }

        located(&self.region, res.region.as_deref())
            && located(&self.zone, res.zone.as_deref())
            && eq(&self.resource_group, res.resource_group.as_deref())
            && eq(&self.parent_cloud_id, res.spec.parent_cloud_id())
            && eq(&self.owner_cloud_id, res.spec.owner_cloud_id())
            && self
                .cloud_ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| id == &res.cloud_id))
    }
}

/// Read access to the external host inventory (CMDB)
#[async_trait]
pub trait HostSource: Send + Sync {
    /// Look hosts up by host id, regardless of the business they belong to
    async fn list_hosts(&self, host_ids: &[i64]) -> Result<Vec<ExternalHost>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceSpec, SubnetSpec};

    fn subnet(id: &str, vpc: &str, region: &str) -> CloudResource {
        CloudResource::new(
            id,
            id,
            ResourceSpec::Subnet(SubnetSpec {
                vpc_cloud_id: vpc.into(),
                ..Default::default()
            }),
        )
        .with_region(region)
    }

    #[test]
    fn test_empty_option_matches_everything() {
        assert!(ListOption::new().matches(&subnet("s-1", "vpc-1", "r1")));
    }

    #[test]
    fn test_option_scopes() {
        let res = subnet("s-1", "vpc-1", "r1");
        assert!(ListOption::new().with_region("r1").matches(&res));
        assert!(!ListOption::new().with_region("r2").matches(&res));
        let global = CloudResource::new("vpc-1", "vpc", ResourceSpec::Vpc(Default::default()));
        assert!(ListOption::new().with_region("r2").matches(&global));
        assert!(ListOption::new().with_parent("vpc-1").matches(&res));
        assert!(!ListOption::new().with_parent("vpc-2").matches(&res));
        assert!(!ListOption::new().with_owner("vm-1").matches(&res));
        assert!(
            ListOption::new()
                .with_cloud_ids(vec!["s-0".into(), "s-1".into()])
                .matches(&res)
        );
        assert!(!ListOption::new().with_cloud_ids(vec![]).matches(&res));
    }
}

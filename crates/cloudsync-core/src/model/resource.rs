//! Cloud resources as reported by a provider, and their local records

use super::host::HostBinding;
use super::{ResourceKind, Vendor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resource as reported by a cloud provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudResource {
    /// Provider-assigned identifier
    pub cloud_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Azure-style resource group, lower case
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lowercase_group"
    )]
    pub resource_group: Option<String>,

    pub spec: ResourceSpec,
}

impl CloudResource {
    pub fn new(cloud_id: impl Into<String>, name: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            cloud_id: cloud_id.into(),
            name: name.into(),
            region: None,
            zone: None,
            resource_group: None,
            spec,
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

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    pub fn as_cvm(&self) -> Option<&CvmSpec> {
        match &self.spec {
            ResourceSpec::Cvm(cvm) => Some(cvm),
            _ => None,
        }
    }
}

/// Kind-specific attributes of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    Vpc(VpcSpec),
    Subnet(SubnetSpec),
    Disk(DiskSpec),
    Eip(EipSpec),
    NetworkInterface(NetworkInterfaceSpec),
    SecurityGroup(SecurityGroupSpec),
    Cvm(CvmSpec),
    Region(RegionSpec),
    Zone(ZoneSpec),
    Firewall(FirewallSpec),
    SubAccount(SubAccountSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Vpc(_) => ResourceKind::Vpc,
            ResourceSpec::Subnet(_) => ResourceKind::Subnet,
            ResourceSpec::Disk(_) => ResourceKind::Disk,
            ResourceSpec::Eip(_) => ResourceKind::Eip,
            ResourceSpec::NetworkInterface(_) => ResourceKind::NetworkInterface,
            ResourceSpec::SecurityGroup(_) => ResourceKind::SecurityGroup,
            ResourceSpec::Cvm(_) => ResourceKind::Cvm,
            ResourceSpec::Region(_) => ResourceKind::Region,
            ResourceSpec::Zone(_) => ResourceKind::Zone,
            ResourceSpec::Firewall(_) => ResourceKind::Firewall,
            ResourceSpec::SubAccount(_) => ResourceKind::SubAccount,
        }
    }

    /// Foreign references that must resolve to local ids before the
    /// resource can be written
    pub fn references(&self) -> Vec<(ResourceKind, &str)> {
        match self {
            ResourceSpec::Subnet(subnet) => vec![(ResourceKind::Vpc, subnet.vpc_cloud_id.as_str())],
            ResourceSpec::Firewall(fw) => vec![(ResourceKind::Vpc, fw.vpc_cloud_id.as_str())],
            ResourceSpec::NetworkInterface(nic) => {
                let mut refs = Vec::new();
                if let Some(vpc) = &nic.vpc_cloud_id {
                    refs.push((ResourceKind::Vpc, vpc.as_str()));
                }
                if let Some(subnet) = &nic.subnet_cloud_id {
                    refs.push((ResourceKind::Subnet, subnet.as_str()));
                }
                refs
            }
            ResourceSpec::Cvm(cvm) => cvm
                .vpc_cloud_ids
                .iter()
                .map(|id| (ResourceKind::Vpc, id.as_str()))
                .chain(
                    cvm.subnet_cloud_ids
                        .iter()
                        .map(|id| (ResourceKind::Subnet, id.as_str())),
                )
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Cloud id of the instance owning this resource, for instance-scoped kinds
    pub fn owner_cloud_id(&self) -> Option<&str> {
        match self {
            ResourceSpec::NetworkInterface(nic) => nic.cvm_cloud_id.as_deref(),
            _ => None,
        }
    }

    /// Cloud id of the parent container, for parent-scoped kinds
    pub fn parent_cloud_id(&self) -> Option<&str> {
        match self {
            ResourceSpec::Subnet(subnet) => Some(subnet.vpc_cloud_id.as_str()),
            ResourceSpec::Firewall(fw) => Some(fw.vpc_cloud_id.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpcSpec {
    #[serde(default)]
    pub cidr: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub vpc_cloud_id: String,
    #[serde(default)]
    pub ipv4_cidr: Vec<String>,
    #[serde(default)]
    pub ipv6_cidr: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskSpec {
    pub size_gb: u64,
    #[serde(default)]
    pub disk_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Set by the lifecycle sync from the boot disks of the reported instances
    #[serde(default)]
    pub is_system_disk: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EipSpec {
    pub public_ip: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_cloud_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceSpec {
    /// Owning instance, if attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvm_cloud_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_cloud_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_cloud_id: Option<String>,
    #[serde(default)]
    pub private_ipv4: Vec<String>,
    #[serde(default)]
    pub public_ipv4: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Compute instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvmSpec {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub machine_type: String,
    #[serde(default)]
    pub vpc_cloud_ids: Vec<String>,
    #[serde(default)]
    pub subnet_cloud_ids: Vec<String>,
    #[serde(default)]
    pub private_ipv4: Vec<String>,
    #[serde(default)]
    pub public_ipv4: Vec<String>,
    #[serde(default)]
    pub private_ipv6: Vec<String>,
    #[serde(default)]
    pub public_ipv6: Vec<String>,
    #[serde(default)]
    pub disks: Vec<AttachedDisk>,
    #[serde(default)]
    pub network_interfaces: Vec<AttachedInterface>,
    /// In evaluation priority order
    #[serde(default)]
    pub security_group_cloud_ids: Vec<String>,
    #[serde(default)]
    pub eip_cloud_ids: Vec<String>,
}

impl CvmSpec {
    pub fn boot_disk(&self) -> Option<&str> {
        self.disks
            .iter()
            .find(|d| d.boot)
            .map(|d| d.cloud_id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachedDisk {
    pub cloud_id: String,
    #[serde(default)]
    pub boot: bool,
}

impl AttachedDisk {
    pub fn data(cloud_id: impl Into<String>) -> Self {
        Self {
            cloud_id: cloud_id.into(),
            boot: false,
        }
    }

    pub fn boot(cloud_id: impl Into<String>) -> Self {
        Self {
            cloud_id: cloud_id.into(),
            boot: true,
        }
    }
}

/// A network interface as embedded in an instance description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachedInterface {
    pub cloud_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_cloud_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_cloud_id: Option<String>,
    #[serde(default)]
    pub eip_cloud_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub region: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallSpec {
    pub vpc_cloud_id: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub source_ranges: Vec<String>,
    #[serde(default)]
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubAccountSpec {
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub display_name: String,
}

/// Resource groups compare case-insensitively upstream; keep one spelling
fn lowercase_group<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let group = Option::<String>::deserialize(deserializer)?;
    Ok(group.map(|g| g.to_lowercase()))
}

/// A foreign reference resolved to its local id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub cloud_id: String,
    pub id: String,
}

/// A resource as persisted in the local store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Local id, immutable once assigned
    pub id: String,
    pub vendor: Vendor,
    pub account_id: String,
    pub cloud_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lowercase_group"
    )]
    pub resource_group: Option<String>,
    pub spec: ResourceSpec,
    #[serde(default)]
    pub refs: Vec<ResourceRef>,
    /// External host binding, meaningful for instances only
    #[serde(default)]
    pub binding: HostBinding,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    pub fn as_cvm(&self) -> Option<&CvmSpec> {
        match &self.spec {
            ResourceSpec::Cvm(cvm) => Some(cvm),
            _ => None,
        }
    }

    /// Whether the provider-reported view differs from this record
    pub fn differs_from(&self, cloud: &CloudResource) -> bool {
        self.name != cloud.name
            || self.region != cloud.region
            || self.zone != cloud.zone
            || self.resource_group != cloud.resource_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_serde_is_tagged_by_kind() {
        let res = CloudResource::new(
            "subnet-1",
            "default",
            ResourceSpec::Subnet(SubnetSpec {
                vpc_cloud_id: "vpc-1".into(),
                ipv4_cidr: vec!["10.0.0.0/24".into()],
                ipv6_cidr: vec![],
            }),
        )
        .with_region("ap-guangzhou");

        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["spec"]["kind"], "subnet");
        assert_eq!(json["spec"]["vpc_cloud_id"], "vpc-1");

        let back: CloudResource = serde_json::from_value(json).unwrap();
        assert_eq!(back, res);
    }

    #[test]
    fn test_references() {
        let cvm = ResourceSpec::Cvm(CvmSpec {
            vpc_cloud_ids: vec!["vpc-1".into()],
            subnet_cloud_ids: vec!["subnet-1".into(), "subnet-2".into()],
            ..Default::default()
        });
        assert_eq!(
            cvm.references(),
            vec![
                (ResourceKind::Vpc, "vpc-1"),
                (ResourceKind::Subnet, "subnet-1"),
                (ResourceKind::Subnet, "subnet-2"),
            ]
        );

        let disk = ResourceSpec::Disk(DiskSpec::default());
        assert!(disk.references().is_empty());
    }

    #[test]
    fn test_scope_accessors() {
        let nic = ResourceSpec::NetworkInterface(NetworkInterfaceSpec {
            cvm_cloud_id: Some("vm-1".into()),
            ..Default::default()
        });
        assert_eq!(nic.owner_cloud_id(), Some("vm-1"));
        assert_eq!(nic.parent_cloud_id(), None);

        let subnet = ResourceSpec::Subnet(SubnetSpec {
            vpc_cloud_id: "vpc-9".into(),
            ..Default::default()
        });
        assert_eq!(subnet.parent_cloud_id(), Some("vpc-9"));
    }

    #[test]
    fn test_boot_disk() {
        let cvm = CvmSpec {
            disks: vec![AttachedDisk::data("d-2"), AttachedDisk::boot("d-1")],
            ..Default::default()
        };
        assert_eq!(cvm.boot_disk(), Some("d-1"));
        assert_eq!(CvmSpec::default().boot_disk(), None);
    }

    #[test]
    fn test_resource_group_is_lowercased() {
        let res = CloudResource::new("x", "x", ResourceSpec::SecurityGroup(Default::default()))
            .with_resource_group("RG-Prod");
        assert_eq!(res.resource_group.as_deref(), Some("rg-prod"));

        let mut json = serde_json::to_value(&res).unwrap();
        json["resource_group"] = "RG-Prod".into();
        let back: CloudResource = serde_json::from_value(json).unwrap();
        assert_eq!(back, res);
    }
}

//! Thin per-kind adapters plugged into the generic pipeline

use cloudsync_core::{
    AttachedDisk, AttachedInterface, CloudResource, ResourceKind, ResourceRecord, ResourceSpec,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Kind-specific hooks of a sync pipeline
pub trait ResourceAdapter: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Adjust cloud items before they are compared
    fn prepare(&self, _items: &mut [CloudResource]) {}

    /// Whether the stored row must be rewritten
    fn is_changed(&self, cloud: &CloudResource, db: &ResourceRecord) -> bool {
        db.differs_from(cloud) || spec_changed(&cloud.spec, &db.spec)
    }
}

/// Adapter for kinds with no special handling
#[derive(Debug, Clone, Copy)]
pub struct StandardAdapter {
    kind: ResourceKind,
}

impl StandardAdapter {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

impl ResourceAdapter for StandardAdapter {
    fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// Disks, with the boot flag also derived from the reported instances
#[derive(Debug, Clone, Default)]
pub struct DiskAdapter {
    boot_disks: HashSet<String>,
}

impl DiskAdapter {
    pub fn new(boot_disks: HashSet<String>) -> Self {
        Self { boot_disks }
    }
}

impl ResourceAdapter for DiskAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Disk
    }

    fn prepare(&self, items: &mut [CloudResource]) {
        for item in items {
            if let ResourceSpec::Disk(disk) = &mut item.spec {
                disk.is_system_disk |= self.boot_disks.contains(&item.cloud_id);
            }
        }
    }
}

fn same_set(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

fn same_disks(a: &[AttachedDisk], b: &[AttachedDisk]) -> bool {
    let by_id = |disks: &[AttachedDisk]| -> BTreeMap<String, bool> {
        disks.iter().map(|d| (d.cloud_id.clone(), d.boot)).collect()
    };
    a.len() == b.len() && by_id(a) == by_id(b)
}

fn same_interfaces(a: &[AttachedInterface], b: &[AttachedInterface]) -> bool {
    #[allow(clippy::type_complexity)]
    fn by_id<'a>(
        nics: &'a [AttachedInterface],
    ) -> BTreeMap<&'a str, (Option<&'a str>, Option<&'a str>, BTreeSet<&'a str>)> {
        nics.iter()
            .map(|n| {
                let eips: BTreeSet<&str> = n.eip_cloud_ids.iter().map(String::as_str).collect();
                (
                    n.cloud_id.as_str(),
                    (n.vpc_cloud_id.as_deref(), n.subnet_cloud_id.as_deref(), eips),
                )
            })
            .collect::<BTreeMap<_, _>>()
    }
    a.len() == b.len() && by_id(a) == by_id(b)
}

/// Field comparison per kind. Address and CIDR lists compare as sets and
/// attachments by cloud id; security group order is evaluation priority and compares as a list.
pub fn spec_changed(cloud: &ResourceSpec, db: &ResourceSpec) -> bool {
    match (cloud, db) {
        (ResourceSpec::Vpc(c), ResourceSpec::Vpc(d)) => {
            !same_set(&c.cidr, &d.cidr) || c.memo != d.memo
        }
        (ResourceSpec::Subnet(c), ResourceSpec::Subnet(d)) => {
            c.vpc_cloud_id != d.vpc_cloud_id
                || !same_set(&c.ipv4_cidr, &d.ipv4_cidr)
                || !same_set(&c.ipv6_cidr, &d.ipv6_cidr)
        }
        (ResourceSpec::Disk(c), ResourceSpec::Disk(d)) => c != d,
        (ResourceSpec::Eip(c), ResourceSpec::Eip(d)) => c != d,
        (ResourceSpec::NetworkInterface(c), ResourceSpec::NetworkInterface(d)) => {
            c.cvm_cloud_id != d.cvm_cloud_id
                || c.vpc_cloud_id != d.vpc_cloud_id
                || c.subnet_cloud_id != d.subnet_cloud_id
                || c.mac_address != d.mac_address
                || !same_set(&c.private_ipv4, &d.private_ipv4)
                || !same_set(&c.public_ipv4, &d.public_ipv4)
        }
        (ResourceSpec::SecurityGroup(c), ResourceSpec::SecurityGroup(d)) => c != d,
        (ResourceSpec::Cvm(c), ResourceSpec::Cvm(d)) => {
            c.status != d.status
                || c.machine_type != d.machine_type
                || !same_set(&c.vpc_cloud_ids, &d.vpc_cloud_ids)
                || !same_set(&c.subnet_cloud_ids, &d.subnet_cloud_ids)
                || !same_set(&c.private_ipv4, &d.private_ipv4)
                || !same_set(&c.public_ipv4, &d.public_ipv4)
                || !same_set(&c.private_ipv6, &d.private_ipv6)
                || !same_set(&c.public_ipv6, &d.public_ipv6)
                || !same_set(&c.eip_cloud_ids, &d.eip_cloud_ids)
                || c.security_group_cloud_ids != d.security_group_cloud_ids
                || !same_disks(&c.disks, &d.disks)
                || !same_interfaces(&c.network_interfaces, &d.network_interfaces)
        }
        (ResourceSpec::Region(c), ResourceSpec::Region(d)) => c != d,
        (ResourceSpec::Zone(c), ResourceSpec::Zone(d)) => c != d,
        (ResourceSpec::Firewall(c), ResourceSpec::Firewall(d)) => {
            c.vpc_cloud_id != d.vpc_cloud_id
                || c.priority != d.priority
                || c.direction != d.direction
                || !same_set(&c.source_ranges, &d.source_ranges)
                || !same_set(&c.allowed, &d.allowed)
        }
        (ResourceSpec::SubAccount(c), ResourceSpec::SubAccount(d)) => c != d,
        _ => true,
    }
}

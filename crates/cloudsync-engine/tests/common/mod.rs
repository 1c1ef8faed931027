use cloudsync_core::{
    AttachedDisk, AttachedInterface, CloudResource, CvmSpec, DiskSpec, EipSpec, MemoryCloud,
    MemoryStore, NetworkInterfaceSpec, ResourceKind, ResourceSpec, SecurityGroupSpec, StoreOp,
    SubnetSpec, SyncLimits, Vendor, VpcSpec,
};
use cloudsync_engine::VendorSyncer;
use std::sync::Arc;

pub struct Harness {
    pub cloud: Arc<MemoryCloud>,
    pub store: Arc<MemoryStore>,
    pub syncer: VendorSyncer,
}

impl Harness {
    pub fn new(vendor: Vendor, resources: Vec<CloudResource>) -> Self {
        Self::with_limits(vendor, resources, SyncLimits::default())
    }

    pub fn with_limits(vendor: Vendor, resources: Vec<CloudResource>, limits: SyncLimits) -> Self {
        let cloud = Arc::new(MemoryCloud::new(vendor, resources));
        let store = Arc::new(MemoryStore::new().with_max_batch(limits.batch_operation_max));
        let syncer = VendorSyncer::new(cloud.clone(), store.clone(), limits).unwrap();
        Self {
            cloud,
            store,
            syncer,
        }
    }

    pub fn cloud_ids(&self, kind: ResourceKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .store
            .records(kind)
            .into_iter()
            .map(|r| r.cloud_id)
            .collect();
        ids.sort();
        ids
    }

    #[allow(dead_code)]
    pub fn count_writes(&self, pred: impl Fn(&StoreOp) -> bool) -> usize {
        self.store.writes().iter().filter(|op| pred(op)).count()
    }
}

#[allow(dead_code)]
pub fn ids(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[allow(dead_code)]
pub fn vpc(id: &str) -> CloudResource {
    CloudResource::new(
        id,
        id,
        ResourceSpec::Vpc(VpcSpec {
            cidr: vec!["10.0.0.0/16".into()],
            memo: None,
        }),
    )
}

#[allow(dead_code)]
pub fn subnet(id: &str, vpc: &str) -> CloudResource {
    CloudResource::new(
        id,
        id,
        ResourceSpec::Subnet(SubnetSpec {
            vpc_cloud_id: vpc.into(),
            ipv4_cidr: vec!["10.0.1.0/24".into()],
            ipv6_cidr: vec![],
        }),
    )
}

#[allow(dead_code)]
pub fn disk(id: &str) -> CloudResource {
    CloudResource::new(
        id,
        id,
        ResourceSpec::Disk(DiskSpec {
            size_gb: 50,
            disk_type: "ssd".into(),
            status: "in_use".into(),
            ..Default::default()
        }),
    )
}

#[allow(dead_code)]
pub fn eip(id: &str) -> CloudResource {
    CloudResource::new(
        id,
        id,
        ResourceSpec::Eip(EipSpec {
            public_ip: "203.0.113.10".into(),
            status: "bind".into(),
            instance_cloud_id: None,
        }),
    )
}

#[allow(dead_code)]
pub fn security_group(id: &str) -> CloudResource {
    CloudResource::new(id, id, ResourceSpec::SecurityGroup(SecurityGroupSpec::default()))
}

#[allow(dead_code)]
pub fn nic(id: &str, vm: &str, vpc: &str, subnet: &str) -> CloudResource {
    CloudResource::new(
        id,
        id,
        ResourceSpec::NetworkInterface(NetworkInterfaceSpec {
            cvm_cloud_id: Some(vm.into()),
            vpc_cloud_id: Some(vpc.into()),
            subnet_cloud_id: Some(subnet.into()),
            private_ipv4: vec!["10.0.1.5".into()],
            ..Default::default()
        }),
    )
}

#[allow(dead_code)]
pub fn bare_vm(id: &str) -> CloudResource {
    CloudResource::new(
        id,
        id,
        ResourceSpec::Cvm(CvmSpec {
            status: "running".into(),
            ..Default::default()
        }),
    )
}

/// An instance in vpc-1/subnet-1 with a boot and a data disk, an eip and
/// the given security groups in priority order
#[allow(dead_code)]
pub fn vm(id: &str, disks: &[&str], sgs: &[&str]) -> CloudResource {
    let mut attached: Vec<AttachedDisk> = Vec::new();
    for (i, d) in disks.iter().enumerate() {
        if i == 0 {
            attached.push(AttachedDisk::boot(*d));
        } else {
            attached.push(AttachedDisk::data(*d));
        }
    }
    CloudResource::new(
        id,
        id,
        ResourceSpec::Cvm(CvmSpec {
            status: "running".into(),
            machine_type: "s5.medium".into(),
            vpc_cloud_ids: vec!["vpc-1".into()],
            subnet_cloud_ids: vec!["subnet-1".into()],
            private_ipv4: vec!["10.0.1.5".into()],
            disks: attached,
            security_group_cloud_ids: ids(sgs),
            eip_cloud_ids: vec![format!("eip-{id}")],
            ..Default::default()
        }),
    )
}

/// Like `vm`, with a single interface carrying the vpc/subnet backlinks
#[allow(dead_code)]
pub fn vm_with_nic(id: &str, nic_id: &str, disks: &[&str]) -> CloudResource {
    let mut res = vm(id, disks, &[]);
    if let ResourceSpec::Cvm(cvm) = &mut res.spec {
        cvm.vpc_cloud_ids.clear();
        cvm.subnet_cloud_ids.clear();
        cvm.eip_cloud_ids.clear();
        cvm.network_interfaces = vec![AttachedInterface {
            cloud_id: nic_id.into(),
            vpc_cloud_id: Some("vpc-1".into()),
            subnet_cloud_id: Some("subnet-1".into()),
            eip_cloud_ids: vec![format!("eip-{id}")],
        }];
    }
    res
}

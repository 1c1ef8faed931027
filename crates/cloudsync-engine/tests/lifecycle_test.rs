mod common;

use cloudsync_core::{
    AttachedDisk, AttachedInterface, CloudResource, CvmSpec, ResourceKind, ResourceSpec, StoreOp,
    SyncBaseParams, SyncError, Vendor,
};
use common::*;
use std::collections::{BTreeSet, HashMap};

fn tcloud_inventory(sgs: &[&str]) -> Vec<CloudResource> {
    vec![
        vpc("vpc-1"),
        subnet("subnet-1", "vpc-1"),
        disk("d-1"),
        disk("d-2"),
        eip("eip-vm-1"),
        security_group("sg-1"),
        security_group("sg-2"),
        security_group("sg-3"),
        vm("vm-1", &["d-1", "d-2"], sgs),
    ]
}

fn batch(id: &str) -> SyncBaseParams {
    SyncBaseParams::new("acc").with_cloud_ids(ids(&[id]))
}

fn local_ids(h: &Harness, kind: ResourceKind) -> HashMap<String, String> {
    h.store
        .records(kind)
        .into_iter()
        .map(|r| (r.cloud_id, r.id))
        .collect()
}

#[tokio::test]
async fn test_lifecycle_syncs_in_dependency_order() {
    let h = Harness::new(Vendor::TCloud, tcloud_inventory(&["sg-1", "sg-2"]));

    let summary = h.syncer.sync_cvm_with_rel_res(&batch("vm-1")).await.unwrap();
    assert_eq!(summary.created, 13);
    assert_eq!(summary.deleted, 0);

    let created_kinds: Vec<ResourceKind> = h
        .store
        .writes()
        .into_iter()
        .filter_map(|op| match op {
            StoreOp::CreateResources { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        created_kinds,
        vec![
            ResourceKind::Vpc,
            ResourceKind::Subnet,
            ResourceKind::SecurityGroup,
            ResourceKind::Disk,
            ResourceKind::Eip,
            ResourceKind::Cvm,
        ]
    );

    // sg-3 is not referenced by the instance
    assert_eq!(
        h.cloud_ids(ResourceKind::SecurityGroup),
        ids(&["sg-1", "sg-2"])
    );

    let boot: Vec<(String, bool)> = h
        .store
        .records(ResourceKind::Disk)
        .into_iter()
        .map(|r| match r.spec {
            ResourceSpec::Disk(d) => (r.cloud_id, d.is_system_disk),
            _ => unreachable!(),
        })
        .collect();
    assert!(boot.contains(&("d-1".to_string(), true)));
    assert!(boot.contains(&("d-2".to_string(), false)));

    assert_eq!(h.store.relations(ResourceKind::Disk).len(), 2);
    assert_eq!(h.store.relations(ResourceKind::Eip).len(), 1);

    let sgs = local_ids(&h, ResourceKind::SecurityGroup);
    let mut sg_rows = h.store.relations(ResourceKind::SecurityGroup);
    sg_rows.sort_by_key(|r| r.priority);
    let order: Vec<(&str, Option<u32>)> = sg_rows
        .iter()
        .map(|r| (r.res_id.as_str(), r.priority))
        .collect();
    assert_eq!(
        order,
        vec![
            (sgs["sg-1"].as_str(), Some(1)),
            (sgs["sg-2"].as_str(), Some(2)),
        ]
    );
}

#[tokio::test]
async fn test_lifecycle_second_run_is_a_noop() {
    let h = Harness::new(Vendor::TCloud, tcloud_inventory(&["sg-1", "sg-2"]));
    h.syncer.sync_cvm_with_rel_res(&batch("vm-1")).await.unwrap();

    h.store.clear_journal();
    let again = h.syncer.sync_cvm_with_rel_res(&batch("vm-1")).await.unwrap();
    assert!(again.is_empty());
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn test_lifecycle_rewrites_only_the_diverging_priorities() {
    let h = Harness::new(Vendor::TCloud, tcloud_inventory(&["sg-1", "sg-2"]));
    h.syncer.sync_cvm_with_rel_res(&batch("vm-1")).await.unwrap();

    h.cloud.upsert(vm("vm-1", &["d-1", "d-2"], &["sg-1", "sg-3"]));
    h.store.clear_journal();
    h.syncer.sync_cvm_with_rel_res(&batch("vm-1")).await.unwrap();

    let sgs = local_ids(&h, ResourceKind::SecurityGroup);
    let vm_id = local_ids(&h, ResourceKind::Cvm)["vm-1"].clone();
    let upserts: Vec<StoreOp> = h
        .store
        .writes()
        .into_iter()
        .filter(|op| matches!(op, StoreOp::UpsertRelations { .. }))
        .collect();
    assert_eq!(upserts.len(), 1);
    let StoreOp::UpsertRelations { upsert, .. } = &upserts[0] else {
        unreachable!()
    };
    assert_eq!(upsert.deletes.len(), 1);
    assert_eq!(upsert.deletes[0].cvm_id, vm_id);
    let kept: Vec<String> = h
        .store
        .relations(ResourceKind::SecurityGroup)
        .into_iter()
        .filter(|r| upsert.deletes[0].keep_ids.contains(&r.id))
        .map(|r| r.res_id)
        .collect();
    assert_eq!(kept, vec![sgs["sg-1"].clone()]);
    assert_eq!(upsert.creates.len(), 1);
    assert_eq!(upsert.creates[0].res_id, sgs["sg-3"]);
    assert_eq!(upsert.creates[0].priority, Some(2));
}

#[tokio::test]
async fn test_lifecycle_with_no_instance_upstream_syncs_instances_only() {
    let h = Harness::new(Vendor::TCloud, vec![bare_vm("vm-9")]);
    h.syncer
        .sync_kind(ResourceKind::Cvm, &SyncBaseParams::new("acc"))
        .await
        .unwrap();

    h.cloud.remove(ResourceKind::Cvm, "vm-9");
    h.cloud.reset_calls();
    let summary = h.syncer.sync_cvm_with_rel_res(&batch("vm-9")).await.unwrap();
    assert_eq!(summary.deleted, 1);
    assert!(h.cloud_ids(ResourceKind::Cvm).is_empty());
    assert!(
        h.cloud
            .calls()
            .iter()
            .all(|(kind, _)| *kind == ResourceKind::Cvm)
    );
}

#[tokio::test]
async fn test_lifecycle_stage_failure_keeps_earlier_stages() {
    let h = Harness::new(Vendor::TCloud, tcloud_inventory(&["sg-1"]));
    h.cloud.fail_on(Some(ResourceKind::Eip));

    let err = h
        .syncer
        .sync_cvm_with_rel_res(&batch("vm-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Upstream(_)));
    assert_eq!(h.cloud_ids(ResourceKind::Disk), ids(&["d-1", "d-2"]));
    assert!(h.cloud_ids(ResourceKind::Cvm).is_empty());
    assert!(h.store.relations(ResourceKind::Disk).is_empty());
}

#[tokio::test]
async fn test_lifecycle_with_per_instance_interfaces() {
    let h = Harness::new(
        Vendor::HuaWei,
        vec![
            vpc("vpc-1"),
            subnet("subnet-1", "vpc-1"),
            disk("d-1"),
            eip("eip-vm-1"),
            nic("nic-1", "vm-1", "vpc-1", "subnet-1"),
            vm_with_nic("vm-1", "nic-1", &["d-1"]),
        ],
    );

    h.syncer.sync_cvm_with_rel_res(&batch("vm-1")).await.unwrap();

    assert_eq!(h.cloud_ids(ResourceKind::NetworkInterface), ids(&["nic-1"]));
    assert_eq!(h.store.relations(ResourceKind::NetworkInterface).len(), 1);
    assert_eq!(h.store.relations(ResourceKind::Disk).len(), 1);
    assert_eq!(h.store.relations(ResourceKind::Eip).len(), 1);

    // huawei subnets are listed under their vpc
    assert!(h.cloud.calls().iter().any(|(kind, opt)| {
        *kind == ResourceKind::Subnet && opt.parent_cloud_id.as_deref() == Some("vpc-1")
    }));
    assert!(h.cloud.calls().iter().any(|(kind, opt)| {
        *kind == ResourceKind::NetworkInterface && opt.owner_cloud_id.as_deref() == Some("vm-1")
    }));
}

fn azure_id(group: &str, kind: &str, name: &str) -> String {
    format!("/subscriptions/sub-1/resourceGroups/{group}/providers/{kind}/{name}")
}

#[tokio::test]
async fn test_lifecycle_partitions_by_resource_group() {
    let vnet = azure_id("RG-A", "Microsoft.Network/virtualNetworks", "vnet-1");
    let sub = format!("{vnet}/subnets/default");
    let os_disk = azure_id("RG-A", "Microsoft.Compute/disks", "os");
    let data_disk = azure_id("RG-B", "Microsoft.Compute/disks", "data");
    let nic_id = azure_id("RG-A", "Microsoft.Network/networkInterfaces", "nic-1");
    let vm_id = azure_id("RG-A", "Microsoft.Compute/virtualMachines", "vm-1");

    let instance = CloudResource::new(
        vm_id.as_str(),
        "vm-1",
        ResourceSpec::Cvm(CvmSpec {
            status: "running".into(),
            disks: vec![
                AttachedDisk::boot(os_disk.as_str()),
                AttachedDisk::data(data_disk.as_str()),
            ],
            network_interfaces: vec![AttachedInterface {
                cloud_id: nic_id.clone(),
                vpc_cloud_id: Some(vnet.clone()),
                subnet_cloud_id: Some(sub.clone()),
                eip_cloud_ids: vec![],
            }],
            ..Default::default()
        }),
    )
    .with_resource_group("RG-A");

    let h = Harness::new(
        Vendor::Azure,
        vec![
            vpc(&vnet).with_resource_group("RG-A"),
            subnet(&sub, &vnet).with_resource_group("RG-A"),
            disk(&os_disk).with_resource_group("RG-A"),
            disk(&data_disk).with_resource_group("RG-B"),
            nic(&nic_id, &vm_id, &vnet, &sub).with_resource_group("RG-A"),
            instance,
        ],
    );

    let params = SyncBaseParams::new("acc")
        .with_resource_group("RG-A")
        .with_cloud_ids(vec![vm_id.clone()]);
    h.syncer.sync_cvm_with_rel_res(&params).await.unwrap();

    let disk_groups: BTreeSet<String> = h
        .cloud
        .calls()
        .into_iter()
        .filter(|(kind, _)| *kind == ResourceKind::Disk)
        .filter_map(|(_, opt)| opt.resource_group)
        .collect();
    assert_eq!(
        disk_groups,
        BTreeSet::from(["rg-a".to_string(), "rg-b".to_string()])
    );
    assert!(
        h.cloud
            .calls()
            .iter()
            .all(|(_, opt)| opt.resource_group.is_some())
    );

    assert_eq!(h.store.records(ResourceKind::Disk).len(), 2);
    assert_eq!(h.store.relations(ResourceKind::Disk).len(), 2);
    assert_eq!(h.store.relations(ResourceKind::NetworkInterface).len(), 1);
    assert_eq!(h.cloud_ids(ResourceKind::Subnet), vec![sub]);
}

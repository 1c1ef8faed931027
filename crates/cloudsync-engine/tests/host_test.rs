mod common;

use cloudsync_core::{
    DataService, ExternalHost, HostCreate, MemoryHostSource, MemoryStore, ResourceKind, StoreOp,
    SyncBaseParams, SyncError, SyncLimits, Vendor,
};
use cloudsync_engine::{HostReconciler, RemoveHostParams, SyncHostParams};
use common::*;
use std::collections::HashSet;
use std::sync::Arc;

fn reconciler(source: &Arc<MemoryHostSource>, store: &Arc<MemoryStore>) -> HostReconciler {
    HostReconciler::new("acc", source.clone(), store.clone(), SyncLimits::default()).unwrap()
}

fn cmdb_host(host_id: i64, biz_id: i64) -> HostCreate {
    HostCreate {
        account_id: "acc".into(),
        cloud_id: format!("_cmdb_{host_id}"),
        name: format!("host-{host_id}"),
        host_id,
        biz_id,
        cloud_area_id: 0,
        region: None,
        private_ipv4: vec![],
        public_ipv4: vec![],
        private_ipv6: vec![],
        public_ipv6: vec![],
    }
}

#[tokio::test]
async fn test_reported_hosts_are_created_once() {
    let source = Arc::new(MemoryHostSource::new(vec![
        ExternalHost::new(1, 3, "web-1").with_inner_ipv4("10.0.0.1,10.0.0.2"),
        ExternalHost::new(2, 3, "web-2"),
    ]));
    let store = Arc::new(MemoryStore::new());
    let hosts = reconciler(&source, &store);

    let summary = hosts.sync_hosts(SyncHostParams::new(vec![1, 2])).await.unwrap();
    assert_eq!(summary.created, 2);

    let mut rows = store.records(ResourceKind::Cvm);
    rows.sort_by(|a, b| a.cloud_id.cmp(&b.cloud_id));
    assert_eq!(rows[0].cloud_id, "_cmdb_1");
    assert_eq!(rows[0].vendor, Vendor::Other);
    assert_eq!(rows[0].binding.host_id, Some(1));
    assert_eq!(rows[0].binding.biz_id, 3);
    assert_eq!(
        rows[0].as_cvm().unwrap().private_ipv4,
        vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]
    );

    store.clear_journal();
    let again = hosts.sync_hosts(SyncHostParams::new(vec![1, 2])).await.unwrap();
    assert!(again.is_empty());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_cached_hosts_skip_the_source() {
    let source = Arc::new(MemoryHostSource::new(vec![
        ExternalHost::new(1, 3, "web-1"),
        ExternalHost::new(2, 3, "web-2"),
    ]));
    let store = Arc::new(MemoryStore::new());
    let hosts = reconciler(&source, &store);
    hosts.sync_hosts(SyncHostParams::new(vec![1, 2])).await.unwrap();

    let params =
        SyncHostParams::new(vec![1, 2]).with_cache([ExternalHost::new(1, 3, "web-1-renamed")]);
    let summary = hosts.sync_hosts(params).await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(source.queried().last(), Some(&vec![2]));

    let renamed = store
        .records(ResourceKind::Cvm)
        .into_iter()
        .find(|r| r.binding.host_id == Some(1))
        .unwrap();
    assert_eq!(renamed.name, "web-1-renamed");
}

#[tokio::test]
async fn test_unbound_cloud_instance_is_bound_not_duplicated() {
    let h = Harness::new(Vendor::TCloud, vec![bare_vm("ins-1")]);
    h.syncer
        .sync_kind(ResourceKind::Cvm, &SyncBaseParams::new("acc"))
        .await
        .unwrap();

    let source = Arc::new(MemoryHostSource::new(vec![
        ExternalHost::new(7, 3, "ins-1").with_cloud_instance(Vendor::TCloud, "ins-1"),
    ]));
    let hosts = reconciler(&source, &h.store);
    h.store.clear_journal();

    let summary = hosts.sync_hosts(SyncHostParams::new(vec![7])).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);

    let rows = h.store.records(ResourceKind::Cvm);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].vendor, Vendor::TCloud);
    assert_eq!(rows[0].binding.host_id, Some(7));
    // the vendor sync owns the other fields
    assert_eq!(rows[0].binding.biz_id, cloudsync_core::model::UNASSIGNED_BIZ);

    h.store.clear_journal();
    let again = hosts.sync_hosts(SyncHostParams::new(vec![7])).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_sync_hosts_validates_input() {
    let source = Arc::new(MemoryHostSource::default());
    let store = Arc::new(MemoryStore::new());
    let hosts = reconciler(&source, &store);

    let err = hosts.sync_hosts(SyncHostParams::new(vec![])).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput(_)));

    let too_many: Vec<i64> = (0..=SyncLimits::default().cloud_resource_sync_max as i64).collect();
    let err = hosts.sync_hosts(SyncHostParams::new(too_many)).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput(_)));
    assert!(source.queried().is_empty());
}

#[tokio::test]
async fn test_business_cleanup_keeps_cloud_rows() {
    let h = Harness::new(Vendor::Aws, vec![bare_vm("i-1")]);
    h.syncer
        .sync_kind(ResourceKind::Cvm, &SyncBaseParams::new("acc"))
        .await
        .unwrap();
    let cloud_row = h.store.records(ResourceKind::Cvm)[0].id.clone();
    h.store
        .batch_update_hosts(vec![cloudsync_core::HostUpdate {
            biz_id: Some(3),
            ..cloudsync_core::HostUpdate::bind(&cloud_row, 30)
        }])
        .await
        .unwrap();
    h.store
        .batch_create_hosts(vec![cmdb_host(1, 3), cmdb_host(2, 3), cmdb_host(4, 5)])
        .await
        .unwrap();

    let source = Arc::new(MemoryHostSource::default());
    let hosts = reconciler(&source, &h.store);
    let summary = hosts
        .remove_hosts(RemoveHostParams {
            biz_id: 3,
            existing_host_ids: HashSet::from([2]),
            del_host_ids: vec![],
        })
        .await
        .unwrap();
    assert_eq!(summary.deleted, 1);

    let mut remaining: Vec<Option<i64>> = h
        .store
        .records(ResourceKind::Cvm)
        .into_iter()
        .map(|r| r.binding.host_id)
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec![Some(2), Some(4), Some(30)]);
}

#[tokio::test]
async fn test_explicit_host_ids_are_deleted() {
    let store = Arc::new(MemoryStore::new());
    store
        .batch_create_hosts(vec![cmdb_host(1, 3), cmdb_host(2, 3)])
        .await
        .unwrap();
    let source = Arc::new(MemoryHostSource::default());
    let hosts = reconciler(&source, &store);
    store.clear_journal();

    let summary = hosts
        .remove_hosts(RemoveHostParams {
            biz_id: 3,
            existing_host_ids: HashSet::new(),
            del_host_ids: vec![2, 99],
        })
        .await
        .unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(store.records(ResourceKind::Cvm).len(), 1);
    assert_eq!(
        store
            .writes()
            .into_iter()
            .filter(|op| matches!(op, StoreOp::DeleteHosts { .. }))
            .count(),
        1
    );
}

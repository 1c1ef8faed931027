//! Cross-resource lifecycle sync
//!
//! For a batch of instances: discover what they reference, sync those
//! kinds in dependency order, then the instances, then instance-scoped
//! interfaces, and finally every relation kind.

use crate::pipeline::{DiskAdapter, ResourceAdapter, StandardAdapter, VendorSyncer};
use crate::relmgr::RelationshipManager;
use cloudsync_core::capability::cvm_relation_kinds;
use cloudsync_core::{
    CloudResource, InterfaceModel, Partition, ResourceKind, Result, SyncBaseParams, SyncError,
    SyncSummary,
};
use std::collections::{BTreeMap, HashSet};

/// What the reported instances reference
#[derive(Debug, Clone)]
pub struct Discovery {
    pub manager: RelationshipManager,
    pub boot_disks: HashSet<String>,
    /// subnet cloud id → owning vpc cloud id
    pub subnet_parents: BTreeMap<String, String>,
}

impl VendorSyncer {
    /// Sync a batch of instances together with everything they reference.
    ///
    /// A stage error aborts the remaining stages; earlier stages keep
    /// their writes and are safe to re-run.
    pub async fn sync_cvm_with_rel_res(&self, params: &SyncBaseParams) -> Result<SyncSummary> {
        params.validate(self.limits())?;

        let cvms = self
            .list_from_cloud(
                ResourceKind::Cvm,
                &params.list_option(),
                params.cloud_ids.as_deref(),
            )
            .await?;
        if cvms.is_empty() {
            tracing::info!(
                vendor = %self.vendor(),
                account_id = %params.account_id,
                "no instance upstream, syncing instances only"
            );
            return self.sync_kind(ResourceKind::Cvm, params).await;
        }

        let discovery = self.discover(&params.account_id, &cvms)?;
        let mgr = &discovery.manager;
        let base = SyncBaseParams {
            account_id: params.account_id.clone(),
            region: params.region.clone(),
            ..Default::default()
        };

        let mut total = SyncSummary::default();

        total += self
            .sync_associated(mgr, &StandardAdapter::new(ResourceKind::Vpc), &base)
            .await?;
        total += self.sync_subnets(mgr, &discovery, &base).await?;
        if self.profile().supports_relation(ResourceKind::SecurityGroup) {
            total += self
                .sync_associated(
                    mgr,
                    &StandardAdapter::new(ResourceKind::SecurityGroup),
                    &base,
                )
                .await?;
        }
        total += self
            .sync_associated(mgr, &DiskAdapter::new(discovery.boot_disks.clone()), &base)
            .await?;
        total += self
            .sync_associated(mgr, &StandardAdapter::new(ResourceKind::Eip), &base)
            .await?;

        total += self.sync_kind(ResourceKind::Cvm, params).await?;

        total += match self.profile().interfaces {
            InterfaceModel::None => SyncSummary::default(),
            InterfaceModel::PerInstance => {
                self.sync_instance_interfaces(&base, &mgr.cvm_cloud_ids())
                    .await?
            }
            InterfaceModel::Standalone => {
                self.sync_associated(
                    mgr,
                    &StandardAdapter::new(ResourceKind::NetworkInterface),
                    &base,
                )
                .await?
            }
        };

        for kind in cvm_relation_kinds(self.vendor())? {
            total += mgr.sync_relation(self.db(), *kind).await?;
        }

        tracing::info!(
            vendor = %self.vendor(),
            account_id = %params.account_id,
            cvms = cvms.len(),
            summary = %total,
            "synced instances with related resources"
        );
        Ok(total)
    }

    /// Collect every id the reported instances reference
    pub fn discover(&self, account_id: &str, cvms: &[CloudResource]) -> Result<Discovery> {
        let profile = self.profile();
        let mut mgr = RelationshipManager::new(self.vendor(), account_id, *self.limits());
        let mut boot_disks = HashSet::new();
        let mut subnet_parents: BTreeMap<String, String> = BTreeMap::new();
        let mut orphan_subnets: Vec<String> = Vec::new();

        for res in cvms {
            let Some(cvm) = res.as_cvm() else {
                continue;
            };
            let vm = res.cloud_id.as_str();
            mgr.add_cvm(vm);

            for vpc in &cvm.vpc_cloud_ids {
                mgr.append_associated_cloud_id(vm, ResourceKind::Vpc, vpc.clone());
            }
            for subnet in &cvm.subnet_cloud_ids {
                mgr.append_associated_cloud_id(vm, ResourceKind::Subnet, subnet.clone());
                match cvm.vpc_cloud_ids.as_slice() {
                    [vpc] => {
                        subnet_parents
                            .entry(subnet.clone())
                            .or_insert_with(|| vpc.clone());
                    }
                    _ => orphan_subnets.push(subnet.clone()),
                }
            }

            for disk in &cvm.disks {
                mgr.append_associated_cloud_id(vm, ResourceKind::Disk, disk.cloud_id.clone());
                if disk.boot {
                    boot_disks.insert(disk.cloud_id.clone());
                }
            }

            for nic in &cvm.network_interfaces {
                if profile.interfaces != InterfaceModel::None {
                    mgr.append_associated_cloud_id(
                        vm,
                        ResourceKind::NetworkInterface,
                        nic.cloud_id.clone(),
                    );
                }
                if let Some(vpc) = &nic.vpc_cloud_id {
                    mgr.append_associated_cloud_id(vm, ResourceKind::Vpc, vpc.clone());
                }
                if let Some(subnet) = &nic.subnet_cloud_id {
                    mgr.append_associated_cloud_id(vm, ResourceKind::Subnet, subnet.clone());
                    match &nic.vpc_cloud_id {
                        Some(vpc) => {
                            subnet_parents.insert(subnet.clone(), vpc.clone());
                        }
                        None => orphan_subnets.push(subnet.clone()),
                    }
                }
                for eip in &nic.eip_cloud_ids {
                    mgr.append_associated_cloud_id(vm, ResourceKind::Eip, eip.clone());
                }
            }

            if profile.supports_relation(ResourceKind::SecurityGroup) {
                for sg in &cvm.security_group_cloud_ids {
                    mgr.append_associated_cloud_id(vm, ResourceKind::SecurityGroup, sg.clone());
                }
            }
            for eip in &cvm.eip_cloud_ids {
                mgr.append_associated_cloud_id(vm, ResourceKind::Eip, eip.clone());
            }
        }

        if profile.subnet_scoped_by_vpc {
            if let Some(orphan) = orphan_subnets
                .iter()
                .find(|s| !subnet_parents.contains_key(*s))
            {
                return Err(SyncError::InvalidInput(format!(
                    "subnet {} has no known vpc",
                    orphan
                )));
            }

            let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (subnet, vpc) in &subnet_parents {
                children.entry(vpc.clone()).or_default().push(subnet.clone());
            }
            mgr.register_parent_children(ResourceKind::Subnet, children);
        }

        Ok(Discovery {
            manager: mgr,
            boot_disks,
            subnet_parents,
        })
    }

    async fn sync_subnets(
        &self,
        mgr: &RelationshipManager,
        discovery: &Discovery,
        base: &SyncBaseParams,
    ) -> Result<SyncSummary> {
        let adapter = StandardAdapter::new(ResourceKind::Subnet);
        if !self.profile().subnet_scoped_by_vpc {
            return self.sync_associated(mgr, &adapter, base).await;
        }
        if discovery.subnet_parents.is_empty() {
            return Ok(SyncSummary::default());
        }

        match self.profile().partition {
            Partition::None => {
                mgr.sync_parent_scoped(ResourceKind::Subnet, |vpc, ids| {
                    let params = base.clone().with_parent(vpc).with_cloud_ids(ids);
                    async move { self.sync_with(&adapter, &params).await }
                })
                .await
            }
            Partition::ResourceGroup => {
                mgr.sync_parent_scoped_by_resource_group(
                    ResourceKind::Subnet,
                    |group, vpc, ids| {
                        let params = base
                            .clone()
                            .with_resource_group(group)
                            .with_parent(vpc)
                            .with_cloud_ids(ids);
                        async move { self.sync_with(&adapter, &params).await }
                    },
                )
                .await
            }
        }
    }

    /// Sync the ids of one associated kind, partitioned the way the vendor
    /// shards its list calls
    async fn sync_associated(
        &self,
        mgr: &RelationshipManager,
        adapter: &dyn ResourceAdapter,
        base: &SyncBaseParams,
    ) -> Result<SyncSummary> {
        let kind = adapter.kind();
        match self.profile().partition {
            Partition::None => {
                mgr.sync_kind(kind, |ids| {
                    let params = base.clone().with_cloud_ids(ids);
                    async move { self.sync_with(adapter, &params).await }
                })
                .await
            }
            Partition::ResourceGroup => {
                mgr.sync_kind_by_resource_group(kind, |group, ids| {
                    let params = base
                        .clone()
                        .with_resource_group(group)
                        .with_cloud_ids(ids);
                    async move { self.sync_with(adapter, &params).await }
                })
                .await
            }
        }
    }
}

//! cloudsync engine
//!
//! Reconciliation built on the `cloudsync-core` contracts:
//!
//! - [`VendorSyncer`]: one generic pipeline per resource kind, the stale
//!   sweep, and the cross-resource lifecycle sync
//! - [`RelationshipManager`]: instance associations and relation rows
//! - [`HostReconciler`]: hosts whose source of truth is an external CMDB

pub mod fanout;
pub mod host;
pub mod lifecycle;
pub mod pipeline;
pub mod priority;
pub mod relmgr;
pub mod resolve;

// Re-exports
pub use fanout::try_for_each_bounded;
pub use host::{
    BizHostRemoval, HostPlan, HostReconciler, RemoveHostParams, SyncHostParams,
    build_cloud_id_from_host_id, host_id_from_cloud_id, plan_biz_host_removal, plan_host_diff,
};
pub use lifecycle::Discovery;
pub use pipeline::{DiskAdapter, ResourceAdapter, StandardAdapter, VendorSyncer};
pub use priority::plan_priority_upsert;
pub use relmgr::RelationshipManager;
pub use resolve::IdResolver;

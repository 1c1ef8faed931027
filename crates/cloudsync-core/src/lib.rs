//! cloudsync core
//!
//! This crate holds everything the reconciliation engine is built from,
//! independent of any particular cloud vendor or datastore.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 cloudsync-engine                 │
//! │   pipelines · relations · lifecycle · hosts      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  cloudsync-core                  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │            Capability contracts           │   │
//! │  │  trait CloudClient · trait DataService    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐   │
//! │  │ Diff Engine│ │  Deletion  │ │ Capability │   │
//! │  │            │ │   Guard    │ │   Matrix   │   │
//! │  └────────────┘ └────────────┘ └────────────┘   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │  vendor API   │ │ data service  │
//! │   clients     │ │  (or memory)  │
//! └───────────────┘ └───────────────┘
//! ```

pub mod batch;
pub mod capability;
pub mod diff;
pub mod error;
pub mod guard;
pub mod memory;
pub mod model;
pub mod provider;
pub mod state;
pub mod store;

// Re-exports
pub use batch::{
    BATCH_OPERATION_MAX, CLOUD_RESOURCE_SYNC_MAX, DEFAULT_PAGE_LIMIT, SYNC_CONCURRENCY,
    SyncBaseParams, SyncLimits,
};
pub use capability::{InterfaceModel, Partition, VendorProfile};
pub use diff::{Diff, SyncSummary, diff};
pub use error::{Result, SyncError};
pub use memory::{CloudSnapshot, MemoryCloud, MemoryHostSource, MemoryStore, StoreOp};
pub use model::{
    AttachedDisk, AttachedInterface, CloudResource, CvmSpec, DiskSpec, EipSpec, ExternalHost,
    FirewallSpec, HostBinding, HostCreate, HostRecord, HostUpdate, NetworkInterfaceSpec,
    RegionSpec, RelationCreate, RelationDeleteFilter, RelationRecord, RelationUpsert,
    ResourceKind, ResourceRecord, ResourceRef, ResourceSpec, SecurityGroupSpec, SubAccountSpec,
    SubnetSpec, Vendor, VpcSpec, ZoneSpec,
};
pub use provider::{CloudClient, HostSource, ListOption};
pub use state::{StateLock, StateManager, StoreSnapshot};
pub use store::{DataService, HostFilter, Page, ResourceCreate, ResourceFilter, ResourceUpdate};

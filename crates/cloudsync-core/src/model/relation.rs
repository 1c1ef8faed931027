//! Relation rows linking an instance to an associated resource

use super::{ResourceKind, Vendor};
use serde::{Deserialize, Serialize};

/// A persisted instance-to-resource link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// Local relation id
    pub id: u64,
    pub vendor: Vendor,
    pub kind: ResourceKind,
    /// Local id of the owning instance
    pub cvm_id: String,
    /// Local id of the associated resource
    pub res_id: String,
    /// Dense 1-based position for ordered kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCreate {
    pub cvm_id: String,
    pub res_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl RelationCreate {
    pub fn new(cvm_id: impl Into<String>, res_id: impl Into<String>) -> Self {
        Self {
            cvm_id: cvm_id.into(),
            res_id: res_id.into(),
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Deletes every relation row of one instance except the listed rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDeleteFilter {
    pub cvm_id: String,
    /// Relation row ids that survive the delete
    #[serde(default)]
    pub keep_ids: Vec<u64>,
}

/// Combined delete-then-create applied by the store in one call.
///
/// Deletes run before creates, so a create may reuse a priority slot that
/// one of the deletes frees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationUpsert {
    #[serde(default)]
    pub deletes: Vec<RelationDeleteFilter>,
    #[serde(default)]
    pub creates: Vec<RelationCreate>,
}

impl RelationUpsert {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.creates.is_empty()
    }

    pub fn merge(&mut self, other: RelationUpsert) {
        self.deletes.extend(other.deletes);
        self.creates.extend(other.creates);
    }
}

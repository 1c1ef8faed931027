//! Sync error types

use crate::model::{ResourceKind, Vendor};
use thiserror::Error;

/// Errors raised by the reconciliation core.
///
/// The variants follow the failure taxonomy of the engine: invalid input is
/// caught before any network call, upstream errors come from the cloud or the
/// data service and are passed through unchanged, consistency violations and
/// unsupported combinations are fatal for the current batch.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cloud API error: {0}")]
    Upstream(String),

    #[error("Data service error: {0}")]
    Store(String),

    #[error("Consistency violation: {kind} {ids:?} still exist upstream, refusing to delete")]
    ConsistencyViolation { kind: ResourceKind, ids: Vec<String> },

    #[error("Unresolved reference: {kind} {cloud_id} not found locally")]
    Unresolved { kind: ResourceKind, cloud_id: String },

    #[error("vendor: {vendor} cvm and {kind} are not associated")]
    UnsupportedRelation { vendor: Vendor, kind: ResourceKind },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether a caller may retry the failed unit of work as-is.
    ///
    /// Only transport failures qualify. Consistency violations need the
    /// upstream state to settle first, and the rest are caller mistakes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Upstream(_) | SyncError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

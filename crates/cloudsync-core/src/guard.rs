//! Deletion guard
//!
//! The cloud and store snapshots of a sync pass are read at different
//! moments. Before any stored row is deleted, the candidates are re-listed
//! upstream; a single survivor vetoes the whole delete.

use crate::error::{Result, SyncError};
use crate::model::ResourceKind;
use crate::provider::{CloudClient, ListOption};

/// Fail with `ConsistencyViolation` if any candidate still exists upstream.
///
/// `scope` carries region/zone/owner restrictions of the original list call;
/// its id subset is replaced chunk by chunk with `candidates`.
pub async fn ensure_absent_upstream(
    cloud: &dyn CloudClient,
    kind: ResourceKind,
    scope: &ListOption,
    candidates: &[String],
    chunk: usize,
) -> Result<()> {
    if candidates.is_empty() {
        return Ok(());
    }

    let mut alive = Vec::new();
    for batch in candidates.chunks(chunk.max(1)) {
        let opt = ListOption {
            cloud_ids: Some(batch.to_vec()),
            ..scope.clone()
        };
        let found = cloud.list(kind, &opt).await.inspect_err(|e| {
            tracing::error!(
                vendor = %cloud.vendor(),
                kind = %kind,
                ids = ?batch,
                error = %e,
                "re-list before delete failed"
            );
        })?;
        alive.extend(
            found
                .into_iter()
                .map(|r| r.cloud_id)
                .filter(|id| batch.contains(id)),
        );
    }

    if !alive.is_empty() {
        tracing::error!(
            vendor = %cloud.vendor(),
            kind = %kind,
            ids = ?alive,
            "delete candidates still exist upstream"
        );
        return Err(SyncError::ConsistencyViolation { kind, ids: alive });
    }

    Ok(())
}

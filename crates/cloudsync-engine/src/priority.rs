//! Priority-ordered association reconciler
//!
//! Security group bindings carry a dense 1-based priority. The longest
//! prefix that already matches the cloud order is kept; everything after
//! it is replaced in one delete-then-create upsert.

use cloudsync_core::{RelationCreate, RelationDeleteFilter, RelationRecord, RelationUpsert};

/// Length of the stored prefix that matches `cloud_order` at dense
/// priorities `1..=n`
pub fn common_prefix_len(cloud_order: &[String], local: &[&RelationRecord]) -> usize {
    cloud_order
        .iter()
        .zip(local)
        .enumerate()
        .take_while(|(i, (cloud, row))| {
            row.res_id == **cloud && row.priority == Some(*i as u32 + 1)
        })
        .count()
}

/// Plan the writes for one instance.
///
/// `cloud_order` holds local resource ids in cloud priority order and
/// `local` the stored rows of the instance in any order. Returns `None`
/// when nothing has to change.
pub fn plan_priority_upsert(
    cvm_id: &str,
    cloud_order: &[String],
    local: &[RelationRecord],
) -> Option<RelationUpsert> {
    let mut sorted: Vec<&RelationRecord> = local.iter().collect();
    sorted.sort_by_key(|r| (r.priority.unwrap_or(u32::MAX), r.id));

    let keep = common_prefix_len(cloud_order, &sorted);
    if keep == cloud_order.len() && keep == sorted.len() {
        return None;
    }

    let creates = cloud_order[keep..]
        .iter()
        .enumerate()
        .map(|(j, res_id)| {
            RelationCreate::new(cvm_id, res_id.clone()).with_priority((keep + j + 1) as u32)
        })
        .collect();

    Some(RelationUpsert {
        deletes: vec![RelationDeleteFilter {
            cvm_id: cvm_id.to_string(),
            keep_ids: sorted[..keep].iter().map(|r| r.id).collect(),
        }],
        creates,
    })
}

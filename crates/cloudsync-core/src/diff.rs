//! Diff engine
//!
//! One algorithm for every resource pair: callers supply key extraction and
//! the change predicate, the engine classifies each item.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Outcome of comparing a cloud collection with the stored one
#[derive(Debug, Clone, PartialEq)]
pub struct Diff<C> {
    /// Cloud items with no stored counterpart
    pub to_create: Vec<C>,

    /// Changed cloud items, keyed by the local id of their stored row
    pub to_update: BTreeMap<String, C>,

    /// Cloud ids of stored rows absent upstream
    pub to_delete: Vec<String>,
}

impl<C> Diff<C> {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            created: self.to_create.len(),
            updated: self.to_update.len(),
            deleted: self.to_delete.len(),
        }
    }
}

impl<C> Default for Diff<C> {
    fn default() -> Self {
        Self {
            to_create: Vec::new(),
            to_update: BTreeMap::new(),
            to_delete: Vec::new(),
        }
    }
}

/// Compare `cloud` against `db`.
///
/// Runs in linear time over a hash index of the stored keys. Output order
/// follows input order; a key reported twice by the cloud is taken once.
pub fn diff<C, D, KC, KD, ID, CH>(
    cloud: Vec<C>,
    db: &[D],
    cloud_key: KC,
    db_key: KD,
    db_id: ID,
    changed: CH,
) -> Diff<C>
where
    KC: Fn(&C) -> &str,
    KD: Fn(&D) -> &str,
    ID: Fn(&D) -> &str,
    CH: Fn(&C, &D) -> bool,
{
    let mut out = Diff::default();
    if cloud.is_empty() && db.is_empty() {
        return out;
    }

    let index: HashMap<&str, &D> = db.iter().map(|d| (db_key(d), d)).collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(cloud.len());

    for item in cloud {
        let key = cloud_key(&item).to_string();
        if !seen.insert(key.clone()) {
            continue;
        }
        match index.get(key.as_str()) {
            None => out.to_create.push(item),
            Some(stored) => {
                if changed(&item, stored) {
                    out.to_update.insert(db_id(stored).to_string(), item);
                }
            }
        }
    }

    let mut deleted: HashSet<&str> = HashSet::new();
    for stored in db {
        let key = db_key(stored);
        if !seen.contains(key) && deleted.insert(key) {
            out.to_delete.push(key.to_string());
        }
    }

    out
}

/// Counts reported by a completed sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncSummary {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }

    pub fn merge(&mut self, other: SyncSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

impl std::ops::AddAssign for SyncSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(rhs);
    }
}

impl std::iter::Sum for SyncSummary {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(SyncSummary::default(), |mut acc, s| {
            acc.merge(s);
            acc
        })
    }
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted",
            self.created, self.updated, self.deleted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Cloud {
        id: String,
        size: u32,
    }

    #[derive(Debug, Clone)]
    struct Row {
        local: String,
        id: String,
        size: u32,
    }

    fn cloud(id: &str, size: u32) -> Cloud {
        Cloud {
            id: id.into(),
            size,
        }
    }

    fn row(local: &str, id: &str, size: u32) -> Row {
        Row {
            local: local.into(),
            id: id.into(),
            size,
        }
    }

    fn run(c: Vec<Cloud>, d: &[Row]) -> Diff<Cloud> {
        diff(
            c,
            d,
            |c| c.id.as_str(),
            |d| d.id.as_str(),
            |d| d.local.as_str(),
            |c, d| c.size != d.size,
        )
    }

    #[test]
    fn test_both_empty() {
        let out = run(vec![], &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_classifies_every_key() {
        let c = vec![cloud("a", 1), cloud("b", 2), cloud("c", 3)];
        let d = vec![row("1", "b", 2), row("2", "c", 30), row("3", "d", 4)];

        let out = run(c, &d);
        assert_eq!(out.to_create, vec![cloud("a", 1)]);
        assert_eq!(out.to_update.len(), 1);
        assert_eq!(out.to_update.get("2"), Some(&cloud("c", 3)));
        assert_eq!(out.to_delete, vec!["d".to_string()]);
        assert_eq!(
            out.summary(),
            SyncSummary {
                created: 1,
                updated: 1,
                deleted: 1
            }
        );
    }

    #[test]
    fn test_completeness_over_synthetic_collections() {
        // cloud keys 0..40, db keys 20..60; even shared keys changed
        let c: Vec<Cloud> = (0..40).map(|i| cloud(&format!("k{i}"), i)).collect();
        let d: Vec<Row> = (20..60)
            .map(|i| {
                let size = if i % 2 == 0 { i + 100 } else { i };
                row(&format!("l{i}"), &format!("k{i}"), size)
            })
            .collect();

        let out = run(c, &d);

        let created: Vec<String> = out.to_create.iter().map(|c| c.id.clone()).collect();
        let expected_created: Vec<String> = (0..20).map(|i| format!("k{i}")).collect();
        assert_eq!(created, expected_created);

        let expected_deleted: Vec<String> = (40..60).map(|i| format!("k{i}")).collect();
        assert_eq!(out.to_delete, expected_deleted);

        let updated: Vec<&String> = out.to_update.keys().collect();
        let mut expected_updated: Vec<String> =
            (20..40).filter(|i| i % 2 == 0).map(|i| format!("l{i}")).collect();
        expected_updated.sort();
        assert_eq!(updated, expected_updated.iter().collect::<Vec<_>>());

        // unchanged shared keys appear nowhere
        assert!(!created.contains(&"k21".to_string()));
        assert!(!out.to_delete.contains(&"k21".to_string()));
        assert!(!out.to_update.contains_key("l21"));
    }

    #[test]
    fn test_second_pass_is_empty() {
        let c = vec![cloud("v1", 1), cloud("v2", 2)];
        let d = vec![row("1", "v1", 1), row("2", "v2", 2)];
        assert!(run(c, &d).is_empty());
    }

    #[test]
    fn test_duplicate_keys_are_taken_once() {
        let c = vec![cloud("a", 1), cloud("a", 2)];
        let d = vec![row("1", "z", 1), row("2", "z", 1)];
        let out = run(c, &d);
        assert_eq!(out.to_create, vec![cloud("a", 1)]);
        assert_eq!(out.to_delete, vec!["z".to_string()]);
    }

    #[test]
    fn test_summary_display_and_sum() {
        let total: SyncSummary = vec![
            SyncSummary {
                created: 1,
                updated: 0,
                deleted: 2,
            },
            SyncSummary {
                created: 3,
                updated: 1,
                deleted: 0,
            },
        ]
        .into_iter()
        .sum();
        assert_eq!(total.to_string(), "4 created, 1 updated, 2 deleted");
        assert!(SyncSummary::default().is_empty());
    }
}

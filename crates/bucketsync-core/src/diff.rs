//! Set difference between two key snapshots.

use std::collections::{BTreeSet, HashMap};

use bucketsync_model::KeyRecord;

/// Classification of names across a `before` and an `after` snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Present only in `after`.
    pub new: BTreeSet<String>,
    /// Present only in `before`.
    pub removed: BTreeSet<String>,
    /// Present in both with a different hash or size.
    pub modified: BTreeSet<String>,
    /// Present in both with the same hash and size.
    pub unmodified: BTreeSet<String>,
}

/// Compare two materialized snapshots.
///
/// Both slices must already be fully collected; listing the same bucket
/// lazily twice can observe different states.
#[must_use]
pub fn diff(before: &[KeyRecord], after: &[KeyRecord]) -> DiffResult {
    let before_by_name: HashMap<&str, &KeyRecord> =
        before.iter().map(|k| (k.name.as_str(), k)).collect();
    let after_by_name: HashMap<&str, &KeyRecord> =
        after.iter().map(|k| (k.name.as_str(), k)).collect();

    let mut result = DiffResult::default();
    for (name, old) in &before_by_name {
        match after_by_name.get(name) {
            None => {
                result.removed.insert((*name).to_owned());
            }
            Some(new) if old.same_content(new) => {
                result.unmodified.insert((*name).to_owned());
            }
            Some(_) => {
                result.modified.insert((*name).to_owned());
            }
        }
    }
    result.new = after_by_name
        .keys()
        .filter(|name| !before_by_name.contains_key(*name))
        .map(|name| (*name).to_owned())
        .collect();
    result
}

//! Label-schema reconciliation within one exposition pass
//!
//! Every metric exported under one fully-qualified name must carry the same
//! label keys. When series of one name disagree, the keys a series lacks are
//! appended to it in sorted order with an empty value.
//!
//! Keys a series already carries never move, so the group ends up sharing
//! one key set, not necessarily one key sequence: {a} and {b} become
//! [a, b] and [b, a]. Values always stay aligned with their keys.

use crate::schema::MetricSeries;

use std::collections::BTreeSet;

/// Whether the group mixes label schemas.
pub fn needs_fill<M: MetricSeries>(group: &[M]) -> bool {
    match group.split_first() {
        Some((first, rest)) => rest.iter().any(|m| m.keys_hash() != first.keys_hash()),
        None => false,
    }
}

/// Give every metric in the group the union of the group's label keys.
pub fn fill_missing_labels<M: MetricSeries>(group: &mut [M]) {
    let all_keys: BTreeSet<String> = group
        .iter()
        .flat_map(|m| m.label_keys().iter().cloned())
        .collect();

    for metric in group.iter_mut() {
        if metric.label_keys().len() == all_keys.len() {
            continue;
        }
        let present: BTreeSet<&str> = metric.label_keys().iter().map(String::as_str).collect();
        let missing: Vec<String> = all_keys
            .iter()
            .filter(|key| !present.contains(key.as_str()))
            .cloned()
            .collect();
        for key in missing {
            metric.push_label(key, String::new());
        }
    }
}

/// Fill missing labels when, and only when, the group's schemas differ.
pub fn reconcile<M: MetricSeries>(group: &mut [M]) -> bool {
    if !needs_fill(group) {
        return false;
    }
    fill_missing_labels(group);
    true
}

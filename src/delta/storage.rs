//! Storage contract for accumulated delta series

use chrono::{DateTime, Utc};

/// A value that can live in a TTL-bounded store.
pub trait StorableMetric: Clone + Send + Sync + 'static {
    /// Short label used in diagnostics and self-metrics ("counter", "histogram")
    const KIND: &'static str;

    /// Last time this process saw a fresh sample for the series.
    fn last_collected_at(&self) -> DateTime<Utc>;
}

/// Partitioned key/value store with lazy TTL eviction.
///
/// Partitions are metric-family names; keys are series identity hashes.
pub trait Storage<T: StorableMetric>: Send + Sync {
    fn get(&self, partition: &str, key: u64) -> Option<T>;

    fn set(&self, partition: &str, key: u64, value: T);

    /// Read-modify-write of one entry under the partition lock.
    ///
    /// `update` receives the current entry, if any, and returns the value to
    /// store, or `None` to leave the entry untouched.
    fn upsert(&self, partition: &str, key: u64, update: &mut dyn FnMut(Option<&T>) -> Option<T>);

    /// Every live entry in the partition. Entries whose last collection is
    /// older than the TTL window are removed and not returned.
    fn list(&self, partition: &str) -> Vec<T>;
}

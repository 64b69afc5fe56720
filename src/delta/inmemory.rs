//! In-memory [`Storage`] with per-partition locking

use super::storage::{StorableMetric, Storage};
use crate::clock::Clock;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type Partition<T> = Mutex<BTreeMap<u64, T>>;

/// Process-lifetime store of accumulated series.
///
/// The partition map is a `DashMap`, so creating a partition is an atomic
/// load-or-store and two first touches of the same family agree on one
/// partition. Each partition has its own mutex: traffic for different
/// families never contends, traffic for one family is serialized.
pub struct InMemoryStorage<T: StorableMetric> {
    data: DashMap<String, Arc<Partition<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: StorableMetric> InMemoryStorage<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            data: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of partitions created so far
    pub fn partition_count(&self) -> usize {
        self.data.len()
    }

    /// Number of stored entries in a partition, expired or not
    pub fn entry_count(&self, partition: &str) -> usize {
        self.existing(partition)
            .map(|p| p.lock().len())
            .unwrap_or(0)
    }

    fn existing(&self, partition: &str) -> Option<Arc<Partition<T>>> {
        // Clone the Arc so the DashMap shard guard is released before the
        // partition mutex is taken.
        self.data.get(partition).map(|p| Arc::clone(p.value()))
    }

    fn get_or_create(&self, partition: &str) -> Arc<Partition<T>> {
        if let Some(existing) = self.existing(partition) {
            return existing;
        }
        self.data
            .entry(partition.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BTreeMap::new())))
            .clone()
    }

    fn ttl_window_start(&self) -> Option<DateTime<Utc>> {
        let ttl = TimeDelta::from_std(self.ttl).ok()?;
        self.clock.now().checked_sub_signed(ttl)
    }
}

impl<T: StorableMetric> Storage<T> for InMemoryStorage<T> {
    fn get(&self, partition: &str, key: u64) -> Option<T> {
        let partition = self.existing(partition)?;
        let entries = partition.lock();
        entries.get(&key).cloned()
    }

    fn set(&self, partition: &str, key: u64, value: T) {
        let partition = self.get_or_create(partition);
        partition.lock().insert(key, value);
    }

    fn upsert(&self, partition: &str, key: u64, update: &mut dyn FnMut(Option<&T>) -> Option<T>) {
        let partition = self.get_or_create(partition);
        let mut entries = partition.lock();
        if let Some(value) = update(entries.get(&key)) {
            entries.insert(key, value);
        }
    }

    fn list(&self, partition_name: &str) -> Vec<T> {
        let Some(partition) = self.existing(partition_name) else {
            return Vec::new();
        };
        let window_start = self.ttl_window_start();

        let mut entries = partition.lock();
        if let Some(window_start) = window_start {
            let before = entries.len();
            entries.retain(|key, collected| {
                if window_start > collected.last_collected_at() {
                    debug!(
                        partition = partition_name,
                        key,
                        kind = T::KIND,
                        last_collected = %collected.last_collected_at(),
                        "Deleting entry outside of TTL"
                    );
                    return false;
                }
                true
            });
            let evicted = before - entries.len();
            if evicted > 0 {
                metrics::counter!("cumulus_delta_evictions_total", "kind" => T::KIND)
                    .increment(evicted as u64);
            }
        }

        entries.values().cloned().collect()
    }
}

//! Delta-to-cumulative accumulation
//!
//! The monitoring API reports DELTA series as the change over each sampling
//! window. Pull-based exposition expects running totals, so every accepted
//! delta is folded into a per-series entry that lives for the lifetime of the
//! exporter:
//!
//! - the first sample of a series becomes its baseline;
//! - a sample with a strictly later report time is folded into the stored
//!   entry ([`DeltaMetric::accumulate`]) and replaces it;
//! - anything else is a duplicate or out-of-order delivery and is dropped.
//!
//! Entries that stop receiving samples are evicted once they fall outside the
//! store's TTL, and only when their family is listed.

mod counter;
mod histogram;
pub mod identity;
mod inmemory;
mod storage;

pub use counter::CounterStore;
pub use histogram::{merge_histograms, HistogramStore};
pub use inmemory::InMemoryStorage;
pub use storage::{StorableMetric, Storage};

use crate::clock::{truncate_delta_to_minutes, truncate_to_minute, Clock};
use crate::schema::MetricSeries;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A sample that can be accumulated across scrapes.
pub trait DeltaMetric: StorableMetric + MetricSeries {
    /// Fold an earlier accepted sample of the same series into `self`.
    fn accumulate(&mut self, existing: &Self);

    /// Accumulation identity of the series
    fn identity_key(&self) -> u64 {
        identity::identity_key(self.fq_name(), self.label_keys(), self.label_values())
    }
}

/// Accumulator for one value kind, shared by every scrape of an exporter.
pub struct DeltaStore<T: DeltaMetric> {
    storage: Arc<dyn Storage<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: DeltaMetric> DeltaStore<T> {
    pub fn new(storage: Arc<dyn Storage<T>>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Store backed by [`InMemoryStorage`] with the given TTL
    pub fn in_memory(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let storage = Arc::new(InMemoryStorage::new(ttl, Arc::clone(&clock)));
        Self::new(storage, clock)
    }

    /// Fold one delta sample into the running state of its series.
    ///
    /// Never fails: absent samples are ignored, and samples that are not
    /// newer than the stored entry are dropped.
    pub fn increment(&self, family: &str, incoming: Option<T>) {
        let Some(incoming) = incoming else {
            return;
        };
        let key = incoming.identity_key();
        let mut incoming = Some(incoming);

        self.storage.upsert(family, key, &mut |existing: Option<&T>| {
            let mut current = incoming.take()?;
            match existing {
                None => {
                    debug!(
                        kind = T::KIND,
                        fq_name = current.fq_name(),
                        key,
                        incoming_time = %current.report_time(),
                        "Tracking new series"
                    );
                    record_outcome::<T>("tracked");
                    Some(current)
                }
                Some(existing) if existing.report_time() < current.report_time() => {
                    debug!(
                        kind = T::KIND,
                        fq_name = current.fq_name(),
                        key,
                        last_reported_time = %existing.report_time(),
                        incoming_time = %current.report_time(),
                        "Incrementing existing series"
                    );
                    current.accumulate(existing);
                    record_outcome::<T>("accumulated");
                    Some(current)
                }
                Some(existing) => {
                    debug!(
                        kind = T::KIND,
                        fq_name = current.fq_name(),
                        key,
                        last_reported_time = %existing.report_time(),
                        incoming_time = %current.report_time(),
                        "Ignoring old sample"
                    );
                    record_outcome::<T>("ignored");
                    None
                }
            }
        });
    }

    /// Live series of a family, with staleness compensation applied.
    ///
    /// A series that got no fresh sample since `reporting_start_time` is
    /// re-stamped at the current minute minus its usual reporting lag, so
    /// downstream staleness handling keeps the accumulated value alive
    /// across a gap in upstream sampling. The adjustment is applied to the
    /// returned copies only; the stored entry keeps its real report time.
    pub fn list_metrics(&self, family: &str, reporting_start_time: DateTime<Utc>) -> Vec<T> {
        let now = truncate_to_minute(self.clock.now());
        let mut metrics = self.storage.list(family);
        for metric in &mut metrics {
            if metric.last_collected_at() < reporting_start_time {
                let lag = truncate_delta_to_minutes(metric.last_collected_at() - metric.report_time());
                let adjusted = now - lag;
                debug!(
                    kind = T::KIND,
                    fq_name = metric.fq_name(),
                    original_time = %metric.report_time(),
                    adjusted_time = %adjusted,
                    "Advancing report time of series without a fresh sample"
                );
                metric.set_report_time(adjusted);
            }
        }
        metrics
    }
}

fn record_outcome<T: StorableMetric>(outcome: &'static str) {
    metrics::counter!(
        "cumulus_delta_samples_total",
        "kind" => T::KIND,
        "outcome" => outcome
    )
    .increment(1);
}

//! Delta histogram accumulation

use super::{DeltaMetric, DeltaStore, StorableMetric};
use crate::schema::HistogramMetric;

use chrono::{DateTime, Utc};

/// Accumulator merging DELTA distribution series window by window
pub type HistogramStore = DeltaStore<HistogramMetric>;

impl StorableMetric for HistogramMetric {
    const KIND: &'static str = "histogram";

    fn last_collected_at(&self) -> DateTime<Utc> {
        self.collection_time
    }
}

impl DeltaMetric for HistogramMetric {
    fn accumulate(&mut self, existing: &Self) {
        merge_histograms(existing, self);
    }
}

/// Merge `existing` into `current` bucket by bucket.
///
/// The count becomes the sum of the merged buckets. The mean is the plain
/// average of the two means, not weighted by sample count, so it drifts
/// from the true combined mean when the windows saw different volumes.
pub fn merge_histograms(existing: &HistogramMetric, current: &mut HistogramMetric) {
    for (upper_bound, count) in existing.buckets.iter() {
        current.buckets.add(upper_bound, count);
    }

    current.mean = (existing.mean + current.mean) / 2.0;
    current.count = current.buckets.total();
}

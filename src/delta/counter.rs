//! Delta counter accumulation

use super::{DeltaMetric, DeltaStore, StorableMetric};
use crate::schema::ConstMetric;

use chrono::{DateTime, Utc};

/// Accumulator turning DELTA scalar series into running totals
pub type CounterStore = DeltaStore<ConstMetric>;

impl StorableMetric for ConstMetric {
    const KIND: &'static str = "counter";

    fn last_collected_at(&self) -> DateTime<Utc> {
        self.collection_time
    }
}

impl DeltaMetric for ConstMetric {
    fn accumulate(&mut self, existing: &Self) {
        self.value += existing.value;
    }
}

//! Metric sample definitions
//!
//! [`ConstMetric`] and [`HistogramMetric`] are the exporter-side shape of a
//! polled sample after its name has been resolved. Both carry two instants:
//! the report time the monitored resource attributes to the observation, and
//! the collection time at which this process handled it.

use crate::delta::identity::hash_label_keys;
use crate::{Error, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exposition value type of a scalar metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Monotonically increasing counter
    Counter,
    /// Point-in-time value
    Gauge,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Counter => "counter",
            ValueType::Gauge => "gauge",
        }
    }
}

/// Kind of a polled time series, as reported by the monitoring API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Instantaneous measurement
    Gauge,
    /// Change since the previous point
    Delta,
    /// Running total since a start time
    Cumulative,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "GAUGE",
            MetricKind::Delta => "DELTA",
            MetricKind::Cumulative => "CUMULATIVE",
        }
    }

    /// Exposition value type for a scalar series of this kind
    pub fn value_type(&self) -> ValueType {
        match self {
            MetricKind::Gauge => ValueType::Gauge,
            MetricKind::Delta | MetricKind::Cumulative => ValueType::Counter,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GAUGE" => Ok(Self::Gauge),
            "DELTA" => Ok(Self::Delta),
            "CUMULATIVE" => Ok(Self::Cumulative),
            other => Err(Error::InvalidSample(format!(
                "unknown metric kind '{}'; expected one of GAUGE, DELTA, CUMULATIVE",
                other
            ))),
        }
    }
}

/// Histogram buckets keyed by upper bound, kept sorted by bound
///
/// Counts are cumulative within each bucket, as the monitoring API
/// reports them after bucket-option expansion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buckets {
    entries: Vec<(f64, u64)>,
}

impl Buckets {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, upper_bound: f64) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|(bound, _)| bound.total_cmp(&upper_bound))
    }

    /// Set the count for a bucket, replacing any previous count
    pub fn insert(&mut self, upper_bound: f64, count: u64) {
        match self.position(upper_bound) {
            Ok(idx) => self.entries[idx].1 = count,
            Err(idx) => self.entries.insert(idx, (upper_bound, count)),
        }
    }

    /// Add to the count of a bucket, creating it when absent
    pub fn add(&mut self, upper_bound: f64, count: u64) {
        match self.position(upper_bound) {
            Ok(idx) => self.entries[idx].1 = self.entries[idx].1.saturating_add(count),
            Err(idx) => self.entries.insert(idx, (upper_bound, count)),
        }
    }

    pub fn get(&self, upper_bound: f64) -> Option<u64> {
        self.position(upper_bound).ok().map(|idx| self.entries[idx].1)
    }

    /// Buckets in ascending upper-bound order
    pub fn iter(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.entries.iter().copied()
    }

    /// Sum of every bucket count
    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, (_, count)| acc.saturating_add(*count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(f64, u64)> for Buckets {
    fn from_iter<I: IntoIterator<Item = (f64, u64)>>(iter: I) -> Self {
        let mut buckets = Buckets::new();
        for (bound, count) in iter {
            buckets.insert(bound, count);
        }
        buckets
    }
}

/// Label and timing accessors shared by scalar and histogram samples
pub trait MetricSeries {
    /// Fully-qualified exposition name
    fn fq_name(&self) -> &str;
    fn label_keys(&self) -> &[String];
    fn label_values(&self) -> &[String];
    /// Hash over the sorted label keys only
    fn keys_hash(&self) -> u64;
    fn report_time(&self) -> DateTime<Utc>;
    fn set_report_time(&mut self, report_time: DateTime<Utc>);
    fn collection_time(&self) -> DateTime<Utc>;
    /// Append a label at the end of the key/value sequences
    fn push_label(&mut self, key: String, value: String);
}

/// A scalar sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstMetric {
    pub fq_name: String,
    pub label_keys: Vec<String>,
    pub value_type: ValueType,
    pub value: f64,
    pub label_values: Vec<String>,
    pub report_time: DateTime<Utc>,
    pub collection_time: DateTime<Utc>,
    pub keys_hash: u64,
}

impl ConstMetric {
    pub fn new(
        fq_name: impl Into<String>,
        label_keys: Vec<String>,
        label_values: Vec<String>,
        value_type: ValueType,
        value: f64,
        report_time: DateTime<Utc>,
        collection_time: DateTime<Utc>,
    ) -> Self {
        let keys_hash = hash_label_keys(&label_keys);
        Self {
            fq_name: fq_name.into(),
            label_keys,
            value_type,
            value,
            label_values,
            report_time,
            collection_time,
            keys_hash,
        }
    }
}

/// A distribution sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramMetric {
    pub fq_name: String,
    pub label_keys: Vec<String>,
    pub mean: f64,
    pub count: u64,
    pub buckets: Buckets,
    pub label_values: Vec<String>,
    pub report_time: DateTime<Utc>,
    pub collection_time: DateTime<Utc>,
    pub keys_hash: u64,
}

impl HistogramMetric {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fq_name: impl Into<String>,
        label_keys: Vec<String>,
        label_values: Vec<String>,
        mean: f64,
        count: u64,
        buckets: Buckets,
        report_time: DateTime<Utc>,
        collection_time: DateTime<Utc>,
    ) -> Self {
        let keys_hash = hash_label_keys(&label_keys);
        Self {
            fq_name: fq_name.into(),
            label_keys,
            mean,
            count,
            buckets,
            label_values,
            report_time,
            collection_time,
            keys_hash,
        }
    }

    /// The monitoring API reports no sum, so it is derived from the mean.
    pub fn sum(&self) -> f64 {
        self.mean * self.count as f64
    }
}

macro_rules! impl_metric_series {
    ($ty:ty) => {
        impl MetricSeries for $ty {
            fn fq_name(&self) -> &str {
                &self.fq_name
            }

            fn label_keys(&self) -> &[String] {
                &self.label_keys
            }

            fn label_values(&self) -> &[String] {
                &self.label_values
            }

            fn keys_hash(&self) -> u64 {
                self.keys_hash
            }

            fn report_time(&self) -> DateTime<Utc> {
                self.report_time
            }

            fn set_report_time(&mut self, report_time: DateTime<Utc>) {
                self.report_time = report_time;
            }

            fn collection_time(&self) -> DateTime<Utc> {
                self.collection_time
            }

            fn push_label(&mut self, key: String, value: String) {
                self.label_keys.push(key);
                self.label_values.push(value);
                self.keys_hash = hash_label_keys(&self.label_keys);
            }
        }
    };
}

impl_metric_series!(ConstMetric);
impl_metric_series!(HistogramMetric);

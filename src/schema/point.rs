//! Polled time-series points, as handed over by the monitoring API poller

use super::metrics::{Buckets, MetricKind};
use crate::{Error, Result};

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A distribution value: mean, total count and cumulative bucket counts
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub mean: f64,
    pub count: u64,
    pub buckets: Buckets,
}

/// Value carried by a point
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    Scalar(f64),
    Distribution(Distribution),
}

/// One observation of one time series
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    /// Monitored resource type (e.g. `gce_instance`)
    pub resource_type: String,
    /// Metric type (e.g. `compute.googleapis.com/instance/cpu/usage_time`)
    pub metric_type: String,
    /// Label key/value pairs in exposition order
    pub labels: Vec<(String, String)>,
    pub kind: MetricKind,
    /// Instant the monitored resource attributes to the observation
    pub observed_at: DateTime<Utc>,
    pub value: PointValue,
}

impl TimeSeriesPoint {
    pub fn scalar(
        resource_type: impl Into<String>,
        metric_type: impl Into<String>,
        kind: MetricKind,
        observed_at: DateTime<Utc>,
        value: f64,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            metric_type: metric_type.into(),
            labels: Vec::new(),
            kind,
            observed_at,
            value: PointValue::Scalar(value),
        }
    }

    pub fn distribution(
        resource_type: impl Into<String>,
        metric_type: impl Into<String>,
        kind: MetricKind,
        observed_at: DateTime<Utc>,
        distribution: Distribution,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            metric_type: metric_type.into(),
            labels: Vec::new(),
            kind,
            observed_at,
            value: PointValue::Distribution(distribution),
        }
    }

    /// Append a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Split labels into the parallel key and value sequences
    pub fn label_columns(&self) -> (Vec<String>, Vec<String>) {
        self.labels.iter().cloned().unzip()
    }

    pub fn validate(&self) -> Result<()> {
        if self.metric_type.trim().is_empty() {
            return Err(Error::InvalidSample("metric type cannot be empty".to_string()));
        }
        let mut seen = HashSet::with_capacity(self.labels.len());
        for (key, _) in &self.labels {
            if !seen.insert(key.as_str()) {
                return Err(Error::InvalidSample(format!(
                    "duplicate label key '{}' on {}",
                    key, self.metric_type
                )));
            }
        }
        Ok(())
    }
}

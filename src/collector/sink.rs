//! Output side of a collection: timestamped metric records and their sink

use crate::schema::{Buckets, ConstMetric, HistogramMetric, ValueType};
use crate::Result;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Value of an exported record
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar {
        value_type: ValueType,
        value: f64,
    },
    Histogram {
        count: u64,
        sum: f64,
        buckets: Buckets,
    },
}

/// One exported sample, stamped with its own observation time
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedMetric {
    pub fq_name: String,
    pub help: String,
    pub label_keys: Vec<String>,
    pub label_values: Vec<String>,
    pub value: MetricValue,
    pub timestamp: DateTime<Utc>,
}

impl TimestampedMetric {
    pub fn from_const(metric: ConstMetric, help: &str) -> Self {
        Self {
            fq_name: metric.fq_name,
            help: help.to_string(),
            label_keys: metric.label_keys,
            label_values: metric.label_values,
            value: MetricValue::Scalar {
                value_type: metric.value_type,
                value: metric.value,
            },
            timestamp: metric.report_time,
        }
    }

    pub fn from_histogram(metric: HistogramMetric, help: &str) -> Self {
        let sum = metric.sum();
        Self {
            fq_name: metric.fq_name,
            help: help.to_string(),
            label_keys: metric.label_keys,
            label_values: metric.label_values,
            value: MetricValue::Histogram {
                count: metric.count,
                sum,
                buckets: metric.buckets,
            },
            timestamp: metric.report_time,
        }
    }

    /// Value of a label, if the record carries it
    pub fn label(&self, key: &str) -> Option<&str> {
        self.label_keys
            .iter()
            .position(|k| k == key)
            .and_then(|idx| self.label_values.get(idx))
            .map(String::as_str)
    }
}

/// Receiving end of a [`MetricSink`]
pub type MetricReceiver = mpsc::UnboundedReceiver<TimestampedMetric>;

/// Cloneable producer handle for exported records.
///
/// Each collector owns one clone. The receiver sees the channel close only
/// once every clone has been dropped, so one family finishing early never
/// cuts off the others.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::UnboundedSender<TimestampedMetric>,
}

impl MetricSink {
    pub fn channel() -> (MetricSink, MetricReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MetricSink { tx }, rx)
    }

    pub fn send(&self, metric: TimestampedMetric) -> Result<()> {
        self.tx.send(metric)?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

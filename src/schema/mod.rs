//! Sample definitions for Cumulus
//!
//! Points arrive from the poller as [`TimeSeriesPoint`]s and are turned into
//! [`ConstMetric`] or [`HistogramMetric`] samples once their fully-qualified
//! name is known. Labels travel as two parallel sequences so that positional
//! key/value correspondence survives label reconciliation.

mod metrics;
mod point;

pub use metrics::{
    Buckets,
    ConstMetric,
    HistogramMetric,
    MetricKind,
    MetricSeries,
    ValueType,
};
pub use point::{Distribution, PointValue, TimeSeriesPoint};

//! # Cumulus
//!
//! Turns polled cloud-monitoring time series into metrics for pull-based
//! exposition.
//!
//! Most series translate one to one. DELTA series do not: the monitoring API
//! reports them as the change over each sampling window, while a scraper
//! expects running totals. Cumulus keeps a TTL-bounded, per-family store of
//! accumulated series that survives across scrapes, folds every newer delta
//! into it, and exports the totals with their own observation timestamps.
//!
//! ## Architecture
//!
//! - **Delta**: identity hashing, the partitioned TTL store, and the counter
//!   and histogram accumulators built on it
//! - **Collector**: per-scrape routing of points to immediate export, label
//!   buffering or accumulation, then staleness compensation and label-schema
//!   reconciliation at completion
//! - **Exposition**: text rendering of the exported records

pub mod clock;
pub mod collector;
pub mod config;
pub mod delta;
pub mod exposition;
pub mod naming;
pub mod schema;
pub mod telemetry;

mod error;

pub use config::ExporterConfig;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::collector::{
        Accumulators, MetricFamily, MetricReceiver, MetricSink, MetricValue, TimeSeriesCollector,
        TimestampedMetric,
    };
    pub use crate::config::{CollectorConfig, ExporterConfig};
    pub use crate::delta::{CounterStore, DeltaStore, HistogramStore, InMemoryStorage};
    pub use crate::schema::{
        Buckets, ConstMetric, Distribution, HistogramMetric, MetricKind, TimeSeriesPoint, ValueType,
    };
    pub use crate::{Error, Result};
}

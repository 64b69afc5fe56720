//! Per-scrape, per-family collection
//!
//! A [`TimeSeriesCollector`] is created for one metric family at the start of
//! a scrape and consumed by [`TimeSeriesCollector::complete`]. Each point it
//! receives takes one of three paths:
//!
//! - DELTA points, when delta aggregation is on, go to the shared
//!   accumulators and are exported from there at completion;
//! - with label filling on, points are buffered by fully-qualified name so
//!   their label schemas can be reconciled at completion;
//! - anything else is exported immediately.
//!
//! The buffers are owned by the collector and never shared between scrapes;
//! the accumulators are shared and outlive it.

pub mod labels;
mod sink;

pub use sink::{MetricReceiver, MetricSink, MetricValue, TimestampedMetric};

use crate::clock::Clock;
use crate::config::CollectorConfig;
use crate::delta::{CounterStore, HistogramStore};
use crate::naming::series_fq_name;
use crate::schema::{
    ConstMetric, Distribution, HistogramMetric, MetricKind, PointValue, TimeSeriesPoint, ValueType,
};
use crate::Result;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Out-of-band definition of the family being collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricFamily {
    /// Descriptor name, also the accumulator partition
    pub name: String,
    pub description: String,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Delta accumulators shared by every collector of one exporter
#[derive(Clone)]
pub struct Accumulators {
    pub counters: Arc<CounterStore>,
    pub histograms: Arc<HistogramStore>,
}

impl Accumulators {
    pub fn new(counters: Arc<CounterStore>, histograms: Arc<HistogramStore>) -> Self {
        Self {
            counters,
            histograms,
        }
    }

    /// In-memory accumulators with one TTL for both value kinds
    pub fn in_memory(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: Arc::new(CounterStore::in_memory(ttl, Arc::clone(&clock))),
            histograms: Arc::new(HistogramStore::in_memory(ttl, clock)),
        }
    }
}

/// Collector for one family within one scrape
pub struct TimeSeriesCollector {
    family: MetricFamily,
    namespace: String,
    sink: MetricSink,
    config: CollectorConfig,
    accumulators: Accumulators,
    clock: Arc<dyn Clock>,
    const_metrics: BTreeMap<String, Vec<ConstMetric>>,
    histogram_metrics: BTreeMap<String, Vec<HistogramMetric>>,
}

impl TimeSeriesCollector {
    pub fn new(
        family: MetricFamily,
        namespace: impl Into<String>,
        sink: MetricSink,
        config: CollectorConfig,
        accumulators: Accumulators,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            family,
            namespace: namespace.into(),
            sink,
            config,
            accumulators,
            clock,
            const_metrics: BTreeMap::new(),
            histogram_metrics: BTreeMap::new(),
        }
    }

    pub fn family(&self) -> &MetricFamily {
        &self.family
    }

    /// Number of metrics waiting for label reconciliation
    pub fn buffered_len(&self) -> usize {
        self.const_metrics.values().map(Vec::len).sum::<usize>()
            + self.histogram_metrics.values().map(Vec::len).sum::<usize>()
    }

    /// Route one polled point.
    ///
    /// Invalid points are logged and skipped; only a closed sink is an error.
    pub fn collect(&mut self, point: TimeSeriesPoint) -> Result<()> {
        if let Err(e) = point.validate() {
            debug!(family = %self.family.name, error = %e, "Skipping invalid time series point");
            return Ok(());
        }

        let fq_name = series_fq_name(&self.namespace, &point.resource_type, &point.metric_type);
        let (label_keys, label_values) = point.label_columns();

        match point.value {
            PointValue::Scalar(value) => self.collect_const(
                fq_name,
                label_keys,
                label_values,
                point.kind.value_type(),
                value,
                point.observed_at,
                point.kind,
            ),
            PointValue::Distribution(distribution) => self.collect_histogram(
                fq_name,
                label_keys,
                label_values,
                distribution,
                point.observed_at,
                point.kind,
            ),
        }
    }

    fn accumulates(&self, kind: MetricKind) -> bool {
        kind == MetricKind::Delta && self.config.aggregate_deltas
    }

    #[allow(clippy::too_many_arguments)]
    pub fn collect_const(
        &mut self,
        fq_name: String,
        label_keys: Vec<String>,
        label_values: Vec<String>,
        value_type: ValueType,
        value: f64,
        report_time: DateTime<Utc>,
        kind: MetricKind,
    ) -> Result<()> {
        let metric = ConstMetric::new(
            fq_name,
            label_keys,
            label_values,
            value_type,
            value,
            report_time,
            self.clock.now(),
        );

        if self.accumulates(kind) {
            self.accumulators
                .counters
                .increment(&self.family.name, Some(metric));
            return Ok(());
        }

        if self.config.fill_missing_labels {
            self.const_metrics
                .entry(metric.fq_name.clone())
                .or_default()
                .push(metric);
            return Ok(());
        }

        self.emit_const(metric)
    }

    pub fn collect_histogram(
        &mut self,
        fq_name: String,
        label_keys: Vec<String>,
        label_values: Vec<String>,
        distribution: Distribution,
        report_time: DateTime<Utc>,
        kind: MetricKind,
    ) -> Result<()> {
        let metric = HistogramMetric::new(
            fq_name,
            label_keys,
            label_values,
            distribution.mean,
            distribution.count,
            distribution.buckets,
            report_time,
            self.clock.now(),
        );

        if self.accumulates(kind) {
            self.accumulators
                .histograms
                .increment(&self.family.name, Some(metric));
            return Ok(());
        }

        if self.config.fill_missing_labels {
            self.histogram_metrics
                .entry(metric.fq_name.clone())
                .or_default()
                .push(metric);
            return Ok(());
        }

        self.emit_histogram(metric)
    }

    /// Finish the scrape for this family.
    ///
    /// Accumulated series are drained (with staleness compensation relative to
    /// `reporting_start_time`), label schemas are reconciled per name, and
    /// everything left is exported with its own observation time.
    pub fn complete(mut self, reporting_start_time: DateTime<Utc>) -> Result<()> {
        self.complete_delta_const_metrics(reporting_start_time)?;
        self.complete_delta_histogram_metrics(reporting_start_time)?;

        let const_metrics = std::mem::take(&mut self.const_metrics);
        for (fq_name, mut group) in const_metrics {
            if labels::reconcile(&mut group) {
                debug!(fq_name = %fq_name, series = group.len(), "Filled missing labels");
            }
            for metric in group {
                self.emit_const(metric)?;
            }
        }

        let histogram_metrics = std::mem::take(&mut self.histogram_metrics);
        for (fq_name, mut group) in histogram_metrics {
            if labels::reconcile(&mut group) {
                debug!(fq_name = %fq_name, series = group.len(), "Filled missing labels");
            }
            for metric in group {
                self.emit_histogram(metric)?;
            }
        }

        Ok(())
    }

    fn complete_delta_const_metrics(&mut self, reporting_start_time: DateTime<Utc>) -> Result<()> {
        let accumulated = self
            .accumulators
            .counters
            .list_metrics(&self.family.name, reporting_start_time);

        for metric in accumulated {
            if self.config.fill_missing_labels {
                self.const_metrics
                    .entry(metric.fq_name.clone())
                    .or_default()
                    .push(metric);
            } else {
                self.emit_const(metric)?;
            }
        }
        Ok(())
    }

    fn complete_delta_histogram_metrics(&mut self, reporting_start_time: DateTime<Utc>) -> Result<()> {
        let accumulated = self
            .accumulators
            .histograms
            .list_metrics(&self.family.name, reporting_start_time);

        for metric in accumulated {
            if self.config.fill_missing_labels {
                self.histogram_metrics
                    .entry(metric.fq_name.clone())
                    .or_default()
                    .push(metric);
            } else {
                self.emit_histogram(metric)?;
            }
        }
        Ok(())
    }

    fn emit_const(&self, metric: ConstMetric) -> Result<()> {
        self.sink
            .send(TimestampedMetric::from_const(metric, &self.family.description))
    }

    fn emit_histogram(&self, metric: HistogramMetric) -> Result<()> {
        self.sink
            .send(TimestampedMetric::from_histogram(metric, &self.family.description))
    }
}

//! Integration tests for per-scrape collection
//!
//! Tests cover:
//! - DELTA points accumulated across scrapes and exported at completion
//! - Staleness compensation for series that missed a scrape
//! - Label-schema reconciliation of buffered series
//! - Direct emission with the point's own observation time
//! - Invalid points and closed sinks
//! - Many family collectors sharing one sink

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use cumulus::exposition::render;
use cumulus::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const RESOURCE: &str = "pubsub_subscription";
const METRIC_TYPE: &str = "pubsub.googleapis.com/subscription/pull_request_count";
const FQ_NAME: &str =
    "stackdriver_pubsub_subscription_pubsub_googleapis_com_subscription_pull_request_count";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
}

fn config(fill_missing_labels: bool, aggregate_deltas: bool) -> CollectorConfig {
    CollectorConfig {
        fill_missing_labels,
        aggregate_deltas,
        ttl: Duration::from_secs(3600),
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    accumulators: Accumulators,
    config: CollectorConfig,
}

impl Harness {
    fn new(config: CollectorConfig) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let accumulators = Accumulators::in_memory(config.ttl, clock.clone());
        Self {
            clock,
            accumulators,
            config,
        }
    }

    fn collector(&self, sink: MetricSink) -> TimeSeriesCollector {
        TimeSeriesCollector::new(
            MetricFamily::new(METRIC_TYPE, "Cumulative count of pull requests"),
            "stackdriver",
            sink,
            self.config,
            self.accumulators.clone(),
            self.clock.clone(),
        )
    }

    /// Run one scrape at `now` and return everything it exported
    fn scrape(&self, now: DateTime<Utc>, points: Vec<TimeSeriesPoint>) -> Vec<TimestampedMetric> {
        self.clock.set(now);
        let (sink, mut rx) = MetricSink::channel();
        let mut collector = self.collector(sink);
        for point in points {
            collector.collect(point).unwrap();
        }
        collector.complete(now).unwrap();

        let mut out = vec![];
        while let Ok(metric) = rx.try_recv() {
            out.push(metric);
        }
        out
    }
}

fn delta(subscription: &str, value: f64, observed_at: DateTime<Utc>) -> TimeSeriesPoint {
    TimeSeriesPoint::scalar(RESOURCE, METRIC_TYPE, MetricKind::Delta, observed_at, value)
        .with_label("subscription_id", subscription)
}

fn scalar_value(metric: &TimestampedMetric) -> f64 {
    match metric.value {
        MetricValue::Scalar { value, .. } => value,
        MetricValue::Histogram { .. } => panic!("expected a scalar record"),
    }
}

fn key_set(metric: &TimestampedMetric) -> BTreeSet<&str> {
    metric.label_keys.iter().map(String::as_str).collect()
}

#[test]
fn test_delta_points_accumulate_across_scrapes() {
    let harness = Harness::new(config(false, true));

    let first = harness.scrape(
        t0() + TimeDelta::minutes(3),
        vec![delta("orders", 5.0, t0() + TimeDelta::minutes(1))],
    );
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].fq_name, FQ_NAME);
    assert_eq!(scalar_value(&first[0]), 5.0);
    assert_eq!(first[0].timestamp, t0() + TimeDelta::minutes(1));

    let second = harness.scrape(
        t0() + TimeDelta::minutes(4),
        vec![delta("orders", 3.0, t0() + TimeDelta::minutes(2))],
    );
    assert_eq!(second.len(), 1);
    assert_eq!(scalar_value(&second[0]), 8.0);
    assert_eq!(second[0].timestamp, t0() + TimeDelta::minutes(2));
    assert!(matches!(
        second[0].value,
        MetricValue::Scalar {
            value_type: ValueType::Counter,
            ..
        }
    ));
}

#[test]
fn test_missed_scrape_is_compensated() {
    let harness = Harness::new(config(false, true));
    harness.scrape(
        t0() + TimeDelta::minutes(4),
        vec![delta("orders", 8.0, t0() + TimeDelta::minutes(2))],
    );

    // No fresh sample: the series is re-stamped at now minus its usual 2 minute lag
    let stale = harness.scrape(t0() + TimeDelta::seconds(6 * 60 + 30), vec![]);
    assert_eq!(stale.len(), 1);
    assert_eq!(scalar_value(&stale[0]), 8.0);
    assert_eq!(stale[0].timestamp, t0() + TimeDelta::minutes(4));

    // The stored series keeps its real report time, so a genuine sample at
    // minute 3 is still newer and accumulates
    let fresh = harness.scrape(
        t0() + TimeDelta::minutes(7),
        vec![delta("orders", 1.0, t0() + TimeDelta::minutes(3))],
    );
    assert_eq!(scalar_value(&fresh[0]), 9.0);
    assert_eq!(fresh[0].timestamp, t0() + TimeDelta::minutes(3));
}

#[test]
fn test_redelivered_window_is_not_double_counted() {
    let harness = Harness::new(config(false, true));
    let observed = t0() + TimeDelta::minutes(1);

    harness.scrape(t0() + TimeDelta::minutes(2), vec![delta("orders", 5.0, observed)]);
    let again = harness.scrape(t0() + TimeDelta::minutes(2), vec![delta("orders", 5.0, observed)]);

    assert_eq!(scalar_value(&again[0]), 5.0);
}

#[test]
fn test_delta_without_aggregation_is_exported_raw() {
    let harness = Harness::new(config(false, false));
    let (sink, mut rx) = MetricSink::channel();
    let mut collector = harness.collector(sink);

    let observed = t0() - TimeDelta::minutes(2);
    collector.collect(delta("orders", 5.0, observed)).unwrap();

    let metric = rx.try_recv().unwrap();
    assert_eq!(scalar_value(&metric), 5.0);
    assert_eq!(metric.timestamp, observed);
    assert_eq!(metric.label("subscription_id"), Some("orders"));
    assert_eq!(metric.help, "Cumulative count of pull requests");
}

#[test]
fn test_delta_aggregation_defers_export_until_complete() {
    let harness = Harness::new(config(false, true));
    let (sink, mut rx) = MetricSink::channel();
    let mut collector = harness.collector(sink);

    collector.collect(delta("orders", 5.0, t0())).unwrap();
    assert!(rx.try_recv().is_err());
    assert_eq!(collector.buffered_len(), 0);

    collector.complete(t0()).unwrap();
    assert_eq!(scalar_value(&rx.try_recv().unwrap()), 5.0);
}

#[test]
fn test_label_filling_reconciles_schemas() {
    let harness = Harness::new(config(true, false));
    let (sink, mut rx) = MetricSink::channel();
    let mut collector = harness.collector(sink);

    let gauge = |value: f64| {
        TimeSeriesPoint::scalar(
            "gce_instance",
            "compute.googleapis.com/instance/uptime",
            MetricKind::Gauge,
            t0(),
            value,
        )
    };
    collector
        .collect(gauge(1.0).with_label("zone", "us-east1-b"))
        .unwrap();
    collector
        .collect(
            gauge(2.0)
                .with_label("zone", "us-east1-c")
                .with_label("instance_id", "42"),
        )
        .unwrap();
    assert_eq!(collector.buffered_len(), 2);
    assert!(rx.try_recv().is_err());

    collector.complete(t0()).unwrap();
    let a = rx.try_recv().unwrap();
    let b = rx.try_recv().unwrap();
    assert!(rx.try_recv().is_err());

    assert_eq!(key_set(&a), key_set(&b));
    assert_eq!(a.label_keys, vec!["zone", "instance_id"]);
    assert_eq!(a.label("instance_id"), Some(""));
    assert_eq!(b.label("instance_id"), Some("42"));
}

#[test]
fn test_label_filling_leaves_uniform_schemas_alone() {
    let harness = Harness::new(config(true, false));
    let out = harness.scrape(t0(), vec![delta("orders", 1.0, t0()), delta("billing", 2.0, t0())]);
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|m| m.label_keys == vec!["subscription_id"]));
}

#[test]
fn test_accumulated_series_join_label_reconciliation() {
    let harness = Harness::new(config(true, true));
    let out = harness.scrape(
        t0() + TimeDelta::minutes(2),
        vec![
            delta("orders", 1.0, t0()),
            delta("billing", 2.0, t0()).with_label("project", "acme"),
        ],
    );

    assert_eq!(out.len(), 2);
    assert_eq!(key_set(&out[0]), key_set(&out[1]));
    let orders = out
        .iter()
        .find(|m| m.label("subscription_id") == Some("orders"))
        .unwrap();
    assert_eq!(orders.label("project"), Some(""));
}

#[test]
fn test_histogram_delta_is_merged_and_rendered() {
    let harness = Harness::new(config(false, true));
    let dist = |count: u64, mean: f64| Distribution {
        mean,
        count,
        buckets: [(1.0, count)].into_iter().collect(),
    };
    let point = |d: Distribution, at: DateTime<Utc>| {
        TimeSeriesPoint::distribution(
            "https_lb_rule",
            "loadbalancing.googleapis.com/https/backend_latencies",
            MetricKind::Delta,
            at,
            d,
        )
        .with_label("backend", "web")
    };

    harness.scrape(
        t0() + TimeDelta::minutes(1),
        vec![point(dist(5, 0.5), t0())],
    );
    let out = harness.scrape(
        t0() + TimeDelta::minutes(2),
        vec![point(dist(3, 0.7), t0() + TimeDelta::minutes(1))],
    );

    assert_eq!(out.len(), 1);
    match &out[0].value {
        MetricValue::Histogram { count, buckets, .. } => {
            assert_eq!(*count, 8);
            assert_eq!(buckets.get(1.0), Some(8));
        }
        MetricValue::Scalar { .. } => panic!("expected a histogram record"),
    }

    let text = render(&out);
    let ts = (t0() + TimeDelta::minutes(1)).timestamp_millis();
    assert!(text.contains(&format!(
        "stackdriver_https_lb_rule_loadbalancing_googleapis_com_https_backend_latencies_count{{backend=\"web\"}} 8 {ts}"
    )));
}

fn histogram_point(kind: MetricKind, labels: &[(&str, &str)], count: u64) -> TimeSeriesPoint {
    let distribution = Distribution {
        mean: 0.25,
        count,
        buckets: [(0.5, count - 1), (1.0, count)].into_iter().collect(),
    };
    labels.iter().fold(
        TimeSeriesPoint::distribution(
            "https_lb_rule",
            "loadbalancing.googleapis.com/https/backend_latencies",
            kind,
            t0(),
            distribution,
        ),
        |point, (k, v)| point.with_label(*k, *v),
    )
}

/// Collect two histograms with differing label schemas and check the
/// reconciled records
fn assert_histograms_reconciled(config: CollectorConfig, kind: MetricKind) {
    let harness = Harness::new(config);
    let out = harness.scrape(
        t0() + TimeDelta::minutes(1),
        vec![
            histogram_point(kind, &[("backend", "web")], 4),
            histogram_point(kind, &[("backend", "api"), ("region", "us-east1")], 7),
        ],
    );

    assert_eq!(out.len(), 2);
    assert_eq!(key_set(&out[0]), key_set(&out[1]));
    assert_eq!(key_set(&out[0]), BTreeSet::from(["backend", "region"]));

    let web = out.iter().find(|m| m.label("backend") == Some("web")).unwrap();
    let api = out.iter().find(|m| m.label("backend") == Some("api")).unwrap();
    assert_eq!(web.label("region"), Some(""));
    assert_eq!(api.label("region"), Some("us-east1"));

    for (record, count) in [(web, 4u64), (api, 7u64)] {
        match &record.value {
            MetricValue::Histogram {
                count: got,
                buckets,
                ..
            } => {
                assert_eq!(*got, count);
                assert_eq!(buckets.get(0.5), Some(count - 1));
                assert_eq!(buckets.get(1.0), Some(count));
                assert_eq!(buckets.len(), 2);
            }
            MetricValue::Scalar { .. } => panic!("expected a histogram record"),
        }
        assert_eq!(record.timestamp, t0());
    }
}

#[test]
fn test_buffered_histograms_are_reconciled() {
    assert_histograms_reconciled(config(true, false), MetricKind::Cumulative);
}

#[test]
fn test_accumulated_histograms_join_label_reconciliation() {
    assert_histograms_reconciled(config(true, true), MetricKind::Delta);
}

#[test]
fn test_invalid_point_is_skipped() {
    let harness = Harness::new(config(false, false));
    let (sink, mut rx) = MetricSink::channel();
    let mut collector = harness.collector(sink);

    let invalid = TimeSeriesPoint::scalar(RESOURCE, "", MetricKind::Gauge, t0(), 1.0);
    assert!(collector.collect(invalid).is_ok());
    let duplicate = delta("orders", 1.0, t0()).with_label("subscription_id", "again");
    assert!(collector.collect(duplicate).is_ok());

    collector.complete(t0()).unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_closed_sink_is_reported() {
    let harness = Harness::new(config(false, false));
    let (sink, rx) = MetricSink::channel();
    let mut collector = harness.collector(sink);
    drop(rx);

    let err = collector.collect(delta("orders", 1.0, t0())).unwrap_err();
    assert!(matches!(err, Error::SinkClosed));
}

#[tokio::test]
async fn test_family_collectors_share_one_sink() {
    let harness = Arc::new(Harness::new(config(false, false)));
    let (sink, mut rx) = MetricSink::channel();

    let mut handles = vec![];
    for f in 0..4 {
        let harness = Arc::clone(&harness);
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let mut collector = harness.collector(sink);
            for i in 0..10 {
                let point = delta(&format!("sub-{f}-{i}"), i as f64, t0());
                collector.collect(point).unwrap();
            }
            collector.complete(t0()).unwrap();
        }));
    }
    drop(sink);
    for h in handles {
        h.await.unwrap();
    }

    let mut received = 0;
    while rx.recv().await.is_some() {
        received += 1;
    }
    assert_eq!(received, 40);
}

//! Prometheus text exposition of collected records
//!
//! Records keep their own observation timestamps, so every sample line ends
//! with the record's timestamp in milliseconds.

use crate::collector::{MetricValue, TimestampedMetric};

use std::collections::HashMap;

/// Render records grouped by name, names in first-seen order.
pub fn render(metrics: &[TimestampedMetric]) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&TimestampedMetric>> = HashMap::new();
    for metric in metrics {
        let group = groups.entry(metric.fq_name.as_str()).or_default();
        if group.is_empty() {
            order.push(metric.fq_name.as_str());
        }
        group.push(metric);
    }

    let mut out = String::new();
    for name in order {
        let group = &groups[name];
        let first = group[0];
        out.push_str(&format!("# HELP {} {}\n", name, escape_help(&first.help)));
        out.push_str(&format!("# TYPE {} {}\n", name, type_name(&first.value)));
        for metric in group {
            write_metric(&mut out, metric);
        }
    }
    out
}

fn type_name(value: &MetricValue) -> &'static str {
    match value {
        MetricValue::Scalar { value_type, .. } => value_type.as_str(),
        MetricValue::Histogram { .. } => "histogram",
    }
}

fn write_metric(out: &mut String, metric: &TimestampedMetric) {
    let ts = metric.timestamp.timestamp_millis();
    let labels: Vec<(&str, String)> = metric
        .label_keys
        .iter()
        .zip(metric.label_values.iter())
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();
    let name = metric.fq_name.as_str();

    match &metric.value {
        MetricValue::Scalar { value, .. } => {
            out.push_str(&sample_line(name, "", &labels, &format_value(*value), ts));
        }
        MetricValue::Histogram {
            count,
            sum,
            buckets,
        } => {
            let mut has_inf = false;
            for (upper_bound, bucket_count) in buckets.iter() {
                has_inf |= upper_bound == f64::INFINITY;
                let mut bucket_labels = labels.clone();
                bucket_labels.push(("le", format_value(upper_bound)));
                out.push_str(&sample_line(
                    name,
                    "_bucket",
                    &bucket_labels,
                    &bucket_count.to_string(),
                    ts,
                ));
            }
            if !has_inf {
                let mut bucket_labels = labels.clone();
                bucket_labels.push(("le", "+Inf".to_string()));
                out.push_str(&sample_line(name, "_bucket", &bucket_labels, &count.to_string(), ts));
            }
            out.push_str(&sample_line(name, "_sum", &labels, &format_value(*sum), ts));
            out.push_str(&sample_line(name, "_count", &labels, &count.to_string(), ts));
        }
    }
}

fn sample_line(name: &str, suffix: &str, labels: &[(&str, String)], value: &str, ts: i64) -> String {
    format!("{}{}{} {} {}\n", name, suffix, format_labels(labels), value, ts)
}

fn format_labels(labels: &[(&str, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::new();
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

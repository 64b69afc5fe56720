//! Exposition names for polled time series
//!
//! A fully-qualified name has three parts: a constant namespace, the
//! monitored resource type, and the metric type, e.g.
//! `stackdriver` + `gce_instance` + `compute.googleapis.com/instance/cpu/usage_time`
//! becomes `stackdriver_gce_instance_compute_googleapis_com_instance_cpu_usage_time`.

/// Default namespace prefix for exported metrics
pub const DEFAULT_NAMESPACE: &str = "stackdriver";

/// Reduce a resource or metric type to a safe, lowercase name fragment.
///
/// Any character outside `[A-Za-z0-9_]` splits words; words are trimmed of
/// surrounding underscores, empty words are dropped, and the rest are joined
/// with `_`.
pub fn normalize_metric_name(name: &str) -> String {
    name.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(|word| word.trim_matches('_'))
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Join namespace, subsystem and name with `_`, skipping empty parts.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Fully-qualified name for a series of `metric_type` on `resource_type`.
pub fn series_fq_name(namespace: &str, resource_type: &str, metric_type: &str) -> String {
    build_fq_name(
        namespace,
        &normalize_metric_name(resource_type),
        &normalize_metric_name(metric_type),
    )
}

//! Collector and exporter configuration
//!
//! Values come from defaults, optionally overridden by environment
//! variables:
//! - CUMULUS_FILL_MISSING_LABELS: reconcile label schemas per name (default: false)
//! - CUMULUS_AGGREGATE_DELTAS: accumulate DELTA series into totals (default: false)
//! - CUMULUS_DELTA_TTL_SECS: how long an accumulated series survives without samples (default: 1800)
//! - CUMULUS_METRIC_NAMESPACE: prefix of exported names (default: stackdriver)
//! - CUMULUS_LOG_LEVEL: trace, debug, info, warn or error (default: info)

use crate::naming::DEFAULT_NAMESPACE;
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_FILL_MISSING_LABELS: &str = "CUMULUS_FILL_MISSING_LABELS";
pub const ENV_AGGREGATE_DELTAS: &str = "CUMULUS_AGGREGATE_DELTAS";
pub const ENV_DELTA_TTL_SECS: &str = "CUMULUS_DELTA_TTL_SECS";
pub const ENV_METRIC_NAMESPACE: &str = "CUMULUS_METRIC_NAMESPACE";
pub const ENV_LOG_LEVEL: &str = "CUMULUS_LOG_LEVEL";

/// Default TTL of accumulated delta series
pub const DEFAULT_DELTA_TTL: Duration = Duration::from_secs(30 * 60);

/// Behaviour switches read by every per-family collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Give all series of one exported name the same label keys
    pub fill_missing_labels: bool,
    /// Turn DELTA series into running totals instead of exporting raw deltas
    pub aggregate_deltas: bool,
    /// Maximum age of an accumulated series without fresh samples
    pub ttl: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fill_missing_labels: false,
            aggregate_deltas: false,
            ttl: DEFAULT_DELTA_TTL,
        }
    }
}

impl CollectorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let fill_missing_labels = parse_optional_bool(ENV_FILL_MISSING_LABELS, lookup(ENV_FILL_MISSING_LABELS))?
            .unwrap_or(defaults.fill_missing_labels);
        let aggregate_deltas = parse_optional_bool(ENV_AGGREGATE_DELTAS, lookup(ENV_AGGREGATE_DELTAS))?
            .unwrap_or(defaults.aggregate_deltas);
        let ttl = match lookup(ENV_DELTA_TTL_SECS) {
            Some(raw) => parse_ttl(&raw)?,
            None => defaults.ttl,
        };

        Ok(Self {
            fill_missing_labels,
            aggregate_deltas,
            ttl,
        })
    }
}

/// Exporter-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    pub collector: CollectorConfig,
    /// Namespace prefix of every exported name
    pub namespace: String,
    pub log_level: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ExporterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let collector = CollectorConfig::from_lookup(&lookup)?;
        let namespace = lookup(ENV_METRIC_NAMESPACE)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let log_level = lookup(ENV_LOG_LEVEL)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "info".to_string());

        Ok(Self {
            collector,
            namespace,
            log_level,
        })
    }
}

fn parse_optional_bool(name: &str, raw: Option<String>) -> Result<Option<bool>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = raw.trim().to_ascii_lowercase();
    match value.as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::Config(format!(
            "{name} must be a boolean (true/false/1/0), got '{raw}'"
        ))),
    }
}

fn parse_ttl(raw: &str) -> Result<Duration> {
    let secs: u64 = raw.trim().parse().map_err(|e| {
        Error::Config(format!("{ENV_DELTA_TTL_SECS} must be a whole number of seconds: {e}"))
    })?;
    if secs == 0 {
        return Err(Error::Config(format!(
            "{ENV_DELTA_TTL_SECS} must be greater than zero"
        )));
    }
    Ok(Duration::from_secs(secs))
}

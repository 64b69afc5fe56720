//! Logging bootstrap for processes embedding Cumulus.
//!
//! The library itself only emits `tracing` events. Accumulation decisions
//! (new series, increments, ignored samples, TTL evictions) are logged at
//! `debug`, so they stay silent at the default `info` level.

use crate::{Error, Result};

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Install a JSON `tracing` subscriber at the given level.
///
/// Fails if the level is unknown or a global subscriber is already set.
pub fn init_logging(log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level)?;

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize logging subscriber: {e}")))?;

    info!(log_level = %level, "Logging initialized");
    Ok(())
}

pub fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}

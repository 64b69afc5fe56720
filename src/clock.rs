//! Clock sources for TTL eviction and staleness compensation
//!
//! The delta store and the collector never call `Utc::now()` directly.
//! They read time through [`Clock`] so eviction windows and reporting
//! lag can be driven deterministically.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Stored as nanoseconds since the epoch so it can be shared across
/// threads without a lock.
#[derive(Debug)]
pub struct ManualClock {
    now_ns: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_ns: AtomicI64::new(start.timestamp_nanos_opt().unwrap_or(0)),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        self.now_ns
            .store(instant.timestamp_nanos_opt().unwrap_or(0), Ordering::Release);
    }

    /// Move the clock forward (or backward, for a negative delta).
    pub fn advance(&self, delta: TimeDelta) {
        let ns = delta.num_nanoseconds().unwrap_or(i64::MAX);
        self.now_ns.fetch_add(ns, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.now_ns.load(Ordering::Acquire))
    }
}

/// Truncate an instant down to the start of its minute.
pub fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(TimeDelta::minutes(1))
        .unwrap_or(instant)
}

/// Truncate a span toward zero to a whole number of minutes.
pub fn truncate_delta_to_minutes(delta: TimeDelta) -> TimeDelta {
    TimeDelta::minutes(delta.num_minutes())
}

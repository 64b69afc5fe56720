//! Error types for Cumulus

use std::fmt;

/// Result type alias for Cumulus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Cumulus
///
/// The accumulation path never fails; these cover the edges around it
/// (configuration, logging bootstrap, input validation, sink delivery).
#[derive(Debug)]
pub enum Error {
    /// Configuration errors
    Config(String),
    /// A time series point that cannot be turned into a metric
    InvalidSample(String),
    /// Every receiver of the metric sink has been dropped
    SinkClosed,
    /// Internal error
    Internal(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidSample(msg) => write!(f, "Invalid sample: {}", msg),
            Error::SinkClosed => write!(f, "Metric sink is closed"),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::SinkClosed
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::Config(e.to_string())
    }
}

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Invalid strategy or runner configuration, caught before a stream starts
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be at least 1")]
    ZeroPeriod { name: &'static str },

    #[error("short period ({short}) must be less than long period ({long})")]
    PeriodOrder { short: usize, long: usize },

    #[error("{name} must be within [0, 100], got {value}")]
    ThresholdRange { name: &'static str, value: f64 },

    #[error("oversold threshold ({oversold}) must be below overbought threshold ({overbought})")]
    ThresholdOrder { oversold: f64, overbought: f64 },

    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("at least one symbol must be configured")]
    NoSymbols,

    #[error("{0}")]
    Invalid(String),
}

/// Reason an observation was refused before reaching the price history
#[derive(Debug, Error, PartialEq)]
pub enum ObservationError {
    #[error("{field} is not finite ({value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} is negative ({value})")]
    Negative { field: &'static str, value: f64 },

    #[error("timestamp {timestamp} is earlier than last accepted {last}")]
    OutOfOrder {
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("observation for {got} delivered to {expected} stream")]
    SymbolMismatch { expected: String, got: String },
}

/// Failure reported by an execution sink
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("execution venue unavailable: {0}")]
    Unavailable(String),

    #[error("failed to record trade: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Failure while loading a recorded feed
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

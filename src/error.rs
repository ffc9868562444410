//! Error taxonomy for the pipeline.
//!
//! Every per-pair error stays inside that pair's cycle. None of these types
//! is ever allowed to stop the scheduler.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Rejected bar on ingestion. Local to the store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("out-of-order bar for {pair_id}: {timestamp} is not after last stored {last}")]
    OutOfOrder {
        pair_id: String,
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("bar for {got} appended to series of {expected}")]
    WrongPair { expected: String, got: String },

    #[error("malformed bar for {pair_id} at {timestamp}: {reason}")]
    Malformed {
        pair_id: String,
        timestamp: DateTime<Utc>,
        reason: String,
    },
}

/// Not enough history yet. Expected while a pair warms up and never shown to users.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("insufficient data: need {required} bars, have {available}")]
pub struct InsufficientData {
    pub required: usize,
    pub available: usize,
}

/// Data-feed failure. Always treated as retryable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeedError {
    #[error("feed request for {pair_id} timed out after {timeout:?}")]
    Timeout { pair_id: String, timeout: Duration },

    #[error("feed unavailable for {pair_id}: {message}")]
    Unavailable { pair_id: String, message: String },

    #[error("feed returned malformed data for {pair_id}: {message}")]
    Malformed { pair_id: String, message: String },
}

/// Messaging failure. Logged and recorded, not retried in the same cycle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeliveryError {
    #[error("delivery to {user_id} failed: {message}")]
    Failed { user_id: String, message: String },

    #[error("messaging transport unavailable: {0}")]
    Transport(String),
}

/// Malformed configuration or snapshot. Fatal to one cycle, never to the process.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

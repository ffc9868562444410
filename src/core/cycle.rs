//! Types describing one pair cycle.

use crate::error::{ConfigError, FeedError};
use crate::indicators::{IndicatorParams, IndicatorState};
use crate::models::{IndicatorSnapshot, Signal};
use crate::notify::DispatchReport;
use serde::Serialize;

/// Per-pair state machine:
/// `IDLE -> FETCHING -> COMPUTING -> DISPATCHING -> IDLE`. A suspended pair
/// takes the SKIPPED transition out of IDLE and lands back in IDLE in the
/// same tick; it shows up as [`CycleOutcome::Skipped`], never as a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PairPhase {
    Idle,
    Fetching,
    Computing,
    Dispatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Suspended and the backoff delay has not elapsed.
    InBackoff,
    /// A previous cycle for the pair is still running.
    InFlight,
    ShuttingDown,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Dispatched {
        /// Indicator values the signal was aggregated from.
        snapshot: IndicatorSnapshot,
        signal: Signal,
        report: DispatchReport,
    },
    /// Fetch succeeded without any new bar.
    NoNewData,
    /// Not enough history yet for the full indicator suite.
    NotReady { available: usize, required: usize },
    FeedFailed(FeedError),
    Rejected(ConfigError),
    Skipped(SkipReason),
    /// Shutdown arrived while fetching; nothing was appended.
    Cancelled,
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::FeedFailed(_) | CycleOutcome::Rejected(_))
    }

    pub fn signal(&self) -> Option<&Signal> {
        match self {
            CycleOutcome::Dispatched { signal, .. } => Some(signal),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<&IndicatorSnapshot> {
        match self {
            CycleOutcome::Dispatched { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }
}

/// Cross-cycle memory owned by one pair's slot.
#[derive(Debug, Clone)]
pub struct PairContext {
    pub indicators: IndicatorState,
    pub cycles: u64,
}

impl PairContext {
    pub fn new(params: IndicatorParams) -> Self {
        Self {
            indicators: IndicatorState::new(params),
            cycles: 0,
        }
    }
}

//! Failure accounting, backoff and liveness.

pub mod monitor;
pub mod watchdog;

pub use monitor::{HealthConfig, HealthMonitor, LivenessReport};
pub use watchdog::{Heartbeat, Watchdog};

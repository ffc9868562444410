//! Periodic liveness check over the whole pipeline.

use crate::health::monitor::{HealthMonitor, LivenessReport};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Timestamp of the scheduler's latest round, written by the scheduler and
/// read by the watchdog.
#[derive(Debug, Default)]
pub struct Heartbeat {
    last_round_ms: AtomicI64,
    stalled: AtomicBool,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beat(&self, at: DateTime<Utc>) {
        self.last_round_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_round(&self) -> Option<DateTime<Utc>> {
        match self.last_round_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Relaxed)
    }

    fn set_stalled(&self, stalled: bool) -> bool {
        self.stalled.swap(stalled, Ordering::Relaxed)
    }
}

/// Recovery loop: republishes liveness on a fixed interval and flags the
/// scheduler as stalled when no round started within `stall_after`.
pub struct Watchdog {
    monitor: Arc<HealthMonitor>,
    heartbeat: Arc<Heartbeat>,
    interval: Duration,
    stall_after: Duration,
}

impl Watchdog {
    pub fn new(
        monitor: Arc<HealthMonitor>,
        heartbeat: Arc<Heartbeat>,
        interval: Duration,
        stall_after: Duration,
    ) -> Self {
        Self {
            monitor,
            heartbeat,
            interval,
            stall_after,
        }
    }

    /// One check. Public so tests and the binary can drive it directly.
    pub fn check(&self, now: DateTime<Utc>) -> LivenessReport {
        let report = self.monitor.publish_liveness(now);

        let stalled = match self.heartbeat.last_round() {
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed > self.stall_after)
                .unwrap_or(false),
            None => false,
        };
        let was_stalled = self.heartbeat.set_stalled(stalled);
        if stalled && !was_stalled {
            warn!(
                last_round = ?self.heartbeat.last_round(),
                stall_after_secs = self.stall_after.as_secs(),
                "Watchdog: scheduler has not started a round recently"
            );
        } else if !stalled && was_stalled {
            info!("Watchdog: scheduler rounds resumed");
        }

        debug!(
            liveness = report.liveness,
            healthy = report.pairs_healthy,
            degraded = report.pairs_degraded,
            suspended = report.pairs_suspended,
            "Watchdog: liveness check"
        );
        report
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Watchdog: started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Watchdog: stopped");
                        return;
                    }
                }
            }
        }
    }
}

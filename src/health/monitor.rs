//! Per-pair and per-feed health state machine.
//!
//! HEALTHY --failure--> DEGRADED --(threshold reached)--> SUSPENDED
//! any --success--> HEALTHY (counters reset)
//!
//! A suspended entry is only retried once its backoff delay has elapsed. The
//! delay starts at `backoff_base` and doubles on every failed retry up to
//! `backoff_cap`.

use crate::error::ConfigError;
use crate::metrics::Metrics;
use crate::models::{HealthStatus, PairHealthState};
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const MAX_BACKOFF_STEPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    pub failure_threshold: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Liveness below this is reported as degraded service.
    pub low_liveness_threshold: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            backoff_base: Duration::from_secs(30),
            backoff_cap: Duration::from_secs(900),
            low_liveness_threshold: 0.5,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Inconsistent(
                "failure threshold must be at least 1".to_string(),
            ));
        }
        if self.backoff_base.is_zero() || self.backoff_base > self.backoff_cap {
            return Err(ConfigError::Inconsistent(format!(
                "backoff base {:?} must be non-zero and not exceed cap {:?}",
                self.backoff_base, self.backoff_cap
            )));
        }
        if !(0.0..=1.0).contains(&self.low_liveness_threshold) {
            return Err(ConfigError::Inconsistent(format!(
                "low liveness threshold {} must lie in [0, 1]",
                self.low_liveness_threshold
            )));
        }
        Ok(())
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.backoff_base)
            .with_max_delay(self.backoff_cap)
            .with_factor(2.0)
            .with_max_times(MAX_BACKOFF_STEPS)
            .build()
    }
}

/// Aggregate view published to the monitoring collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessReport {
    pub liveness: f64,
    pub pairs_total: usize,
    pub pairs_healthy: usize,
    pub pairs_degraded: usize,
    pub pairs_suspended: usize,
    pub below_threshold: bool,
    pub at: DateTime<Utc>,
}

impl LivenessReport {
    fn empty(at: DateTime<Utc>) -> Self {
        Self {
            liveness: 1.0,
            pairs_total: 0,
            pairs_healthy: 0,
            pairs_degraded: 0,
            pairs_suspended: 0,
            below_threshold: false,
            at,
        }
    }
}

struct Tracker {
    state: PairHealthState,
    backoff: Option<ExponentialBackoff>,
    delivery_failures: u64,
}

impl Tracker {
    fn new(id: &str) -> Self {
        Self {
            state: PairHealthState::new(id),
            backoff: None,
            delivery_failures: 0,
        }
    }

    fn succeed(&mut self, at: DateTime<Utc>) -> HealthStatus {
        let previous = self.state.status;
        self.state.consecutive_failures = 0;
        self.state.status = HealthStatus::Healthy;
        self.state.last_success_at = Some(at);
        self.state.next_retry_at = None;
        self.backoff = None;
        previous
    }

    fn fail(&mut self, at: DateTime<Utc>, config: &HealthConfig) -> HealthStatus {
        let previous = self.state.status;
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);

        if self.state.consecutive_failures >= config.failure_threshold {
            self.state.status = HealthStatus::Suspended;
            let backoff = self.backoff.get_or_insert_with(|| config.backoff());
            let delay = backoff.next().unwrap_or(config.backoff_cap);
            let delay = chrono::Duration::from_std(delay)
                .unwrap_or_else(|_| chrono::Duration::seconds(config.backoff_cap.as_secs() as i64));
            self.state.next_retry_at = Some(at.checked_add_signed(delay).unwrap_or(at));
        } else {
            self.state.status = HealthStatus::Degraded;
        }
        previous
    }

    fn may_attempt(&self, now: DateTime<Utc>) -> bool {
        match (self.state.status, self.state.next_retry_at) {
            (HealthStatus::Suspended, Some(retry_at)) => now >= retry_at,
            _ => true,
        }
    }
}

/// Health bookkeeping shared by every pair task. State is partitioned per
/// pair and per feed; each lock is held only for a counter update.
pub struct HealthMonitor {
    config: HealthConfig,
    pairs: Mutex<HashMap<String, Tracker>>,
    feeds: Mutex<HashMap<String, Tracker>>,
    liveness_tx: watch::Sender<LivenessReport>,
    metrics: Option<Arc<Metrics>>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        let (liveness_tx, _) = watch::channel(LivenessReport::empty(Utc::now()));
        Self {
            config,
            pairs: Mutex::new(HashMap::new()),
            feeds: Mutex::new(HashMap::new()),
            liveness_tx,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Start tracking pairs so they count towards liveness before their
    /// first cycle.
    pub fn register_pairs<I, S>(&self, pair_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let mut pairs = guard(&self.pairs);
            for id in pair_ids {
                let id = id.as_ref();
                pairs
                    .entry(id.to_string())
                    .or_insert_with(|| Tracker::new(id));
            }
        }
        self.publish_liveness(Utc::now());
    }

    pub fn record_success(&self, pair_id: &str, at: DateTime<Utc>) {
        let previous = {
            let mut pairs = guard(&self.pairs);
            pairs
                .entry(pair_id.to_string())
                .or_insert_with(|| Tracker::new(pair_id))
                .succeed(at)
        };
        if previous != HealthStatus::Healthy {
            info!(pair_id = %pair_id, previous = ?previous, "HealthMonitor: pair recovered to HEALTHY");
            self.publish_liveness(at);
        }
    }

    /// Count a failure and return the resulting state.
    pub fn record_failure(&self, pair_id: &str, at: DateTime<Utc>, reason: &str) -> PairHealthState {
        let (previous, state) = {
            let mut pairs = guard(&self.pairs);
            let tracker = pairs
                .entry(pair_id.to_string())
                .or_insert_with(|| Tracker::new(pair_id));
            let previous = tracker.fail(at, &self.config);
            (previous, tracker.state.clone())
        };

        if state.status == HealthStatus::Suspended {
            warn!(
                pair_id = %pair_id,
                consecutive_failures = state.consecutive_failures,
                next_retry_at = ?state.next_retry_at,
                reason = %reason,
                "HealthMonitor: pair suspended, retrying after backoff"
            );
        } else {
            warn!(
                pair_id = %pair_id,
                consecutive_failures = state.consecutive_failures,
                reason = %reason,
                "HealthMonitor: pair cycle failed"
            );
        }
        if previous != state.status {
            self.publish_liveness(at);
        }
        state
    }

    /// Delivery failures are tallied but never change pair status.
    pub fn record_delivery_failure(&self, pair_id: &str) {
        let mut pairs = guard(&self.pairs);
        pairs
            .entry(pair_id.to_string())
            .or_insert_with(|| Tracker::new(pair_id))
            .delivery_failures += 1;
    }

    pub fn delivery_failures(&self, pair_id: &str) -> u64 {
        guard(&self.pairs)
            .get(pair_id)
            .map(|t| t.delivery_failures)
            .unwrap_or(0)
    }

    pub fn record_feed_success(&self, feed: &str, at: DateTime<Utc>) {
        let previous = guard(&self.feeds)
            .entry(feed.to_string())
            .or_insert_with(|| Tracker::new(feed))
            .succeed(at);
        if previous != HealthStatus::Healthy {
            info!(feed = %feed, "HealthMonitor: feed recovered");
        }
    }

    pub fn record_feed_failure(&self, feed: &str, at: DateTime<Utc>) {
        let mut feeds = guard(&self.feeds);
        let tracker = feeds
            .entry(feed.to_string())
            .or_insert_with(|| Tracker::new(feed));
        tracker.fail(at, &self.config);
    }

    /// Whether the scheduler may run a cycle for `pair_id` at `now`.
    pub fn should_attempt(&self, pair_id: &str, now: DateTime<Utc>) -> bool {
        guard(&self.pairs)
            .get(pair_id)
            .map_or(true, |t| t.may_attempt(now))
    }

    pub fn pair_state(&self, pair_id: &str) -> Option<PairHealthState> {
        guard(&self.pairs).get(pair_id).map(|t| t.state.clone())
    }

    pub fn pair_states(&self) -> Vec<PairHealthState> {
        let mut states: Vec<_> = guard(&self.pairs).values().map(|t| t.state.clone()).collect();
        states.sort_by(|a, b| a.pair_id.cmp(&b.pair_id));
        states
    }

    pub fn feed_states(&self) -> Vec<PairHealthState> {
        let mut states: Vec<_> = guard(&self.feeds).values().map(|t| t.state.clone()).collect();
        states.sort_by(|a, b| a.pair_id.cmp(&b.pair_id));
        states
    }

    pub fn liveness(&self, at: DateTime<Utc>) -> LivenessReport {
        let pairs = guard(&self.pairs);
        if pairs.is_empty() {
            return LivenessReport::empty(at);
        }
        let mut report = LivenessReport::empty(at);
        report.pairs_total = pairs.len();
        for tracker in pairs.values() {
            match tracker.state.status {
                HealthStatus::Healthy => report.pairs_healthy += 1,
                HealthStatus::Degraded => report.pairs_degraded += 1,
                HealthStatus::Suspended => report.pairs_suspended += 1,
            }
        }
        report.liveness = report.pairs_healthy as f64 / report.pairs_total as f64;
        report.below_threshold = report.liveness < self.config.low_liveness_threshold;
        report
    }

    /// Recompute liveness, push it to subscribers and report threshold
    /// crossings. Low liveness is logged, never fatal.
    pub fn publish_liveness(&self, at: DateTime<Utc>) -> LivenessReport {
        let report = self.liveness(at);
        let previous = self.liveness_tx.send_replace(report.clone());

        if report.below_threshold && !previous.below_threshold {
            warn!(
                liveness = report.liveness,
                threshold = self.config.low_liveness_threshold,
                suspended = report.pairs_suspended,
                "HealthMonitor: liveness dropped below threshold"
            );
        } else if !report.below_threshold && previous.below_threshold {
            info!(liveness = report.liveness, "HealthMonitor: liveness restored");
        }

        if let Some(ref metrics) = self.metrics {
            metrics.pairs_healthy.set(report.pairs_healthy as i64);
            metrics.pairs_suspended.set(report.pairs_suspended as i64);
            metrics.liveness_ratio.set(report.liveness);
        }
        report
    }

    pub fn subscribe(&self) -> watch::Receiver<LivenessReport> {
        self.liveness_tx.subscribe()
    }
}

//! Process-level wiring: the scheduler under a restart supervisor, plus the
//! watchdog.

use crate::core::scheduler::PairScheduler;
use crate::health::{HealthMonitor, Watchdog};
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Rounds missed before the watchdog calls the scheduler stalled.
const STALL_ROUNDS: u32 = 3;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub evaluation_interval: Duration,
    pub watchdog_interval: Duration,
    pub restart_min_delay: Duration,
    pub restart_max_delay: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(60),
            watchdog_interval: Duration::from_secs(30),
            restart_min_delay: Duration::from_secs(1),
            restart_max_delay: Duration::from_secs(60),
        }
    }
}

pub struct SignalRuntime {
    config: RuntimeConfig,
    scheduler: Arc<PairScheduler>,
    health: Arc<HealthMonitor>,
}

impl SignalRuntime {
    pub fn new(
        config: RuntimeConfig,
        scheduler: Arc<PairScheduler>,
        health: Arc<HealthMonitor>,
    ) -> Self {
        Self {
            config,
            scheduler,
            health,
        }
    }

    /// Start the supervised scheduler and the watchdog; returns their handles
    /// for graceful shutdown.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.scheduler.clone();
        let config = self.config.clone();
        handles.push(tokio::spawn(supervise(scheduler, config)));

        let watchdog = Watchdog::new(
            self.health.clone(),
            self.scheduler.heartbeat(),
            self.config.watchdog_interval,
            self.config.evaluation_interval * STALL_ROUNDS,
        );
        handles.push(tokio::spawn(watchdog.run(self.scheduler.shutdown_signal())));

        info!("SignalRuntime: scheduler and watchdog started");
        handles
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

/// Restart delays for the tick loop. Escalates across quick successive
/// crashes and starts over once a run has outlived the maximum delay.
struct RestartPolicy {
    min_delay: Duration,
    max_delay: Duration,
    backoff: ExponentialBackoff,
}

impl RestartPolicy {
    fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            backoff: Self::schedule(min_delay, max_delay),
        }
    }

    fn schedule(min_delay: Duration, max_delay: Duration) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(min_delay)
            .with_max_delay(max_delay)
            .with_factor(2.0)
            .with_max_times(usize::MAX)
            .build()
    }

    /// Delay before the next restart, given how long the crashed run lasted.
    fn next_delay(&mut self, ran_for: Duration) -> Duration {
        if ran_for >= self.max_delay {
            self.backoff = Self::schedule(self.min_delay, self.max_delay);
        }
        self.backoff.next().unwrap_or(self.max_delay)
    }
}

/// Keep the tick loop alive: if it ever returns or panics without a
/// shutdown request, restart it after an exponential delay.
async fn supervise(scheduler: Arc<PairScheduler>, config: RuntimeConfig) {
    let mut restarts = RestartPolicy::new(config.restart_min_delay, config.restart_max_delay);

    loop {
        let started = Instant::now();
        let joined = tokio::spawn(scheduler.clone().run()).await;
        if scheduler.is_shutting_down() {
            break;
        }
        match joined {
            Ok(()) => warn!("SignalRuntime: scheduler loop exited unexpectedly"),
            Err(e) => error!(error = %e, "SignalRuntime: scheduler loop panicked"),
        }

        let delay = restarts.next_delay(started.elapsed());
        warn!(delay_ms = delay.as_millis() as u64, "SignalRuntime: restarting scheduler");
        tokio::time::sleep(delay).await;
        if scheduler.is_shutting_down() {
            break;
        }
    }
    info!("SignalRuntime: supervisor stopped");
}

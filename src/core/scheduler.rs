//! Periodic per-pair cycle driver.
//!
//! Every tick spawns one task per configured pair. Tasks are independent: a
//! slow or failing pair never holds up another. A semaphore bounds how many
//! cycles are in flight, and a pair whose previous cycle is still running is
//! skipped rather than started twice.

use crate::config::SchedulerConfig;
use crate::core::context::PipelineContext;
use crate::core::cycle::{CycleOutcome, PairContext, PairPhase, SkipReason};
use crate::error::{ConfigError, FeedError};
use crate::health::Heartbeat;
use crate::indicators::IndicatorEngine;
use crate::signals::{price_change_pct, SignalAggregator, TimeframeAnalyzer};
use chrono::Utc;
use cron::Schedule;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// When rounds start.
enum TickSchedule {
    /// Wall-clock aligned, used when the interval divides a minute or an hour.
    Cron(Schedule),
    Every(Duration),
}

impl TickSchedule {
    fn for_interval(interval: Duration) -> Result<Self, ConfigError> {
        let secs = interval.as_secs();
        if secs == 0 {
            return Err(ConfigError::Inconsistent(
                "scheduler interval must be at least one second".to_string(),
            ));
        }

        // Cron format: second minute hour day month weekday
        let cron_expr = if secs < 60 && 60 % secs == 0 {
            Some(format!("*/{} * * * * *", secs))
        } else if secs % 60 == 0 && secs < 3600 && 60 % (secs / 60) == 0 {
            Some(format!("0 */{} * * * *", secs / 60))
        } else {
            None
        };

        match cron_expr {
            Some(expr) => Schedule::from_str(&expr)
                .map(TickSchedule::Cron)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "EVAL_INTERVAL_SECONDS".to_string(),
                    value: secs.to_string(),
                    reason: format!("cron expression '{}' rejected: {}", expr, e),
                }),
            None => Ok(TickSchedule::Every(interval)),
        }
    }

    fn until_next(&self) -> Duration {
        match self {
            TickSchedule::Cron(schedule) => {
                let now = Utc::now();
                schedule
                    .upcoming(Utc)
                    .next()
                    .and_then(|next| (next - now).to_std().ok())
                    .unwrap_or(Duration::from_secs(1))
            }
            TickSchedule::Every(interval) => *interval,
        }
    }
}

struct Slot {
    phase: PairPhase,
    /// `None` while a cycle owns the context.
    context: Option<Box<PairContext>>,
}

/// Hands a pair's context back to its slot when the cycle ends. A cycle that
/// panics or is aborted never releases its context, so the slot gets a fresh
/// one and the next cycle replays history from the store.
struct SlotGuard {
    scheduler: Arc<PairScheduler>,
    pair_id: String,
    returned: Option<Box<PairContext>>,
}

impl SlotGuard {
    fn release(mut self, context: Box<PairContext>) {
        self.returned = Some(context);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let context = match self.returned.take() {
            Some(context) => context,
            None => {
                warn!(pair_id = %self.pair_id, "PairScheduler: cycle abandoned, resetting pair context");
                Box::new(PairContext::new(*self.scheduler.engine.params()))
            }
        };
        let mut slots = lock(&self.scheduler.slots);
        if let Some(slot) = slots.get_mut(&self.pair_id) {
            slot.context = Some(context);
            slot.phase = PairPhase::Idle;
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves once shutdown has been requested. Pends forever if the sender is
/// gone without ever requesting it.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct PairScheduler {
    config: SchedulerConfig,
    engine: IndicatorEngine,
    aggregator: SignalAggregator,
    timeframes: TimeframeAnalyzer,
    ctx: PipelineContext,
    slots: Mutex<HashMap<String, Slot>>,
    permits: Arc<Semaphore>,
    schedule: TickSchedule,
    heartbeat: Arc<Heartbeat>,
    shutdown_tx: watch::Sender<bool>,
}

impl PairScheduler {
    pub fn new(
        config: SchedulerConfig,
        engine: IndicatorEngine,
        aggregator: SignalAggregator,
        ctx: PipelineContext,
    ) -> Result<Self, ConfigError> {
        if config.max_concurrency == 0 {
            return Err(ConfigError::Inconsistent(
                "max concurrent cycles must be > 0".to_string(),
            ));
        }
        let schedule = TickSchedule::for_interval(config.interval)?;

        let params = *engine.params();
        let slots = config
            .pairs
            .iter()
            .map(|pair_id| {
                (
                    pair_id.clone(),
                    Slot {
                        phase: PairPhase::Idle,
                        context: Some(Box::new(PairContext::new(params))),
                    },
                )
            })
            .collect();
        ctx.health.register_pairs(&config.pairs);

        let (shutdown_tx, _) = watch::channel(false);

        info!(
            pairs = config.pairs.len(),
            interval_secs = config.interval.as_secs(),
            max_concurrency = config.max_concurrency,
            "PairScheduler: created"
        );

        Ok(Self {
            permits: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
            engine,
            aggregator,
            timeframes: TimeframeAnalyzer::default(),
            ctx,
            slots: Mutex::new(slots),
            schedule,
            heartbeat: Arc::new(Heartbeat::new()),
            shutdown_tx,
        })
    }

    /// Also evaluate every signal over these trailing lookbacks.
    pub fn with_timeframes(mut self, timeframes: TimeframeAnalyzer) -> Self {
        self.timeframes = timeframes;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Arc<Heartbeat>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn heartbeat(&self) -> Arc<Heartbeat> {
        self.heartbeat.clone()
    }

    pub fn pairs(&self) -> &[String] {
        &self.config.pairs
    }

    /// Ask the tick loop and every in-flight fetch to stop.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn phase(&self, pair_id: &str) -> Option<PairPhase> {
        lock(&self.slots).get(pair_id).map(|s| s.phase)
    }

    pub fn phases(&self) -> Vec<(String, PairPhase)> {
        let mut phases: Vec<_> = lock(&self.slots)
            .iter()
            .map(|(id, slot)| (id.clone(), slot.phase))
            .collect();
        phases.sort_by(|a, b| a.0.cmp(&b.0));
        phases
    }

    fn set_phase(&self, pair_id: &str, phase: PairPhase) {
        if let Some(slot) = lock(&self.slots).get_mut(pair_id) {
            slot.phase = phase;
        }
    }

    fn claim(self: &Arc<Self>, pair_id: &str) -> Option<(SlotGuard, Box<PairContext>)> {
        let context = {
            let mut slots = lock(&self.slots);
            let slot = slots.get_mut(pair_id)?;
            slot.context.take()?
        };
        let guard = SlotGuard {
            scheduler: Arc::clone(self),
            pair_id: pair_id.to_string(),
            returned: None,
        };
        Some((guard, context))
    }

    /// Spawn one cycle per configured pair and return their handles.
    pub fn spawn_round(self: &Arc<Self>) -> Vec<(String, JoinHandle<CycleOutcome>)> {
        self.heartbeat.beat(Utc::now());
        self.config
            .pairs
            .iter()
            .map(|pair_id| {
                let scheduler = Arc::clone(self);
                let id = pair_id.clone();
                let handle = tokio::spawn(async move { scheduler.run_cycle(&id).await });
                (pair_id.clone(), handle)
            })
            .collect()
    }

    /// Run one round and wait for every pair, in configuration order.
    pub async fn run_round(self: &Arc<Self>) -> Vec<(String, CycleOutcome)> {
        let (ids, handles): (Vec<_>, Vec<_>) = self.spawn_round().into_iter().unzip();
        let results = join_all(handles).await;
        ids.into_iter()
            .zip(results)
            .map(|(pair_id, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    error!(pair_id = %pair_id, error = %e, "PairScheduler: cycle task failed");
                    CycleOutcome::Cancelled
                });
                (pair_id, outcome)
            })
            .collect()
    }

    /// Tick loop. Returns after shutdown once in-flight cycles have finished.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown_signal();
        let mut in_flight: Vec<JoinHandle<CycleOutcome>> = Vec::new();
        info!("PairScheduler: started");

        loop {
            in_flight.retain(|h| !h.is_finished());
            debug!(in_flight = in_flight.len(), "PairScheduler: starting round");
            in_flight.extend(self.spawn_round().into_iter().map(|(_, h)| h));

            let wait = self.schedule.until_next();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        info!(in_flight = in_flight.len(), "PairScheduler: shutting down, draining cycles");
        for joined in join_all(in_flight).await {
            if let Err(e) = joined {
                error!(error = %e, "PairScheduler: cycle task failed during shutdown");
            }
        }
        info!("PairScheduler: stopped");
    }

    /// One full cycle for `pair_id`. Every error is folded into the outcome.
    pub async fn run_cycle(self: &Arc<Self>, pair_id: &str) -> CycleOutcome {
        if self.is_shutting_down() {
            return CycleOutcome::Skipped(SkipReason::ShuttingDown);
        }

        if !self.ctx.health.should_attempt(pair_id, Utc::now()) {
            debug!(pair_id = %pair_id, "PairScheduler: pair suspended, waiting for backoff");
            self.count_skip();
            return CycleOutcome::Skipped(SkipReason::InBackoff);
        }

        let Some((guard, mut context)) = self.claim(pair_id) else {
            debug!(pair_id = %pair_id, "PairScheduler: previous cycle still running, skipping");
            self.count_skip();
            return CycleOutcome::Skipped(SkipReason::InFlight);
        };

        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            guard.release(context);
            return CycleOutcome::Cancelled;
        };

        let started = Instant::now();
        if let Some(ref metrics) = self.ctx.metrics {
            metrics.pair_cycles_total.inc();
        }

        let outcome = self.drive(pair_id, &mut context).await;
        context.cycles += 1;
        guard.release(context);

        if let Some(ref metrics) = self.ctx.metrics {
            metrics
                .pair_cycle_duration_seconds
                .observe(started.elapsed().as_secs_f64());
            if outcome.is_failure() {
                metrics.pair_cycle_failures_total.inc();
            }
        }
        outcome
    }

    fn count_skip(&self) {
        if let Some(ref metrics) = self.ctx.metrics {
            metrics.pair_cycles_skipped_total.inc();
        }
    }

    async fn drive(&self, pair_id: &str, context: &mut PairContext) -> CycleOutcome {
        let ctx = &self.ctx;
        let feed_name = ctx.feed.name().to_string();

        // FETCHING
        self.set_phase(pair_id, PairPhase::Fetching);
        let since = ctx.store.last_timestamp(pair_id);
        let timeout = self.config.feed_timeout;
        let mut shutdown = self.shutdown_signal();

        let fetched = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                debug!(pair_id = %pair_id, "PairScheduler: fetch cancelled by shutdown");
                return CycleOutcome::Cancelled;
            }
            result = tokio::time::timeout(timeout, ctx.feed.fetch(pair_id, since)) => result,
        };

        let mut bars = match fetched {
            Ok(Ok(bars)) => bars,
            Ok(Err(e)) => return self.feed_failed(pair_id, &feed_name, e),
            Err(_elapsed) => {
                let e = FeedError::Timeout {
                    pair_id: pair_id.to_string(),
                    timeout,
                };
                return self.feed_failed(pair_id, &feed_name, e);
            }
        };
        let fetched_at = Utc::now();
        ctx.health.record_feed_success(&feed_name, fetched_at);

        // COMPUTING
        self.set_phase(pair_id, PairPhase::Computing);

        bars.sort_by_key(|b| b.timestamp);
        let mut appended = 0usize;
        for bar in bars {
            match ctx.store.append(pair_id, bar.clone()) {
                Ok(()) => {
                    context.indicators.advance(&bar);
                    appended += 1;
                }
                Err(e) => {
                    debug!(pair_id = %pair_id, error = %e, "PairScheduler: bar rejected");
                    if let Some(ref metrics) = ctx.metrics {
                        metrics.rejected_bars_total.inc();
                    }
                }
            }
        }
        ctx.health.record_success(pair_id, fetched_at);

        if appended == 0 {
            debug!(pair_id = %pair_id, "PairScheduler: no new bars");
            return CycleOutcome::NoNewData;
        }

        let required = self.engine.params().required_history();
        let retained = ctx.store.retained(pair_id);
        if retained.len() < required {
            debug!(
                pair_id = %pair_id,
                available = retained.len(),
                required,
                "PairScheduler: warming up"
            );
            return CycleOutcome::NotReady {
                available: retained.len(),
                required,
            };
        }

        // Indicator values are defined over the retained window. Eviction, or
        // a context reset after an abandoned cycle, leaves the carried state
        // seeded from a different first bar.
        if context.indicators.sync_to(&retained) {
            debug!(pair_id = %pair_id, bars = retained.len(), "PairScheduler: re-seeded indicator state");
        }

        let Some(snapshot) = context
            .indicators
            .snapshot(&retained)
            .or_else(|| self.engine.compute(&retained))
        else {
            return CycleOutcome::NotReady {
                available: 0,
                required,
            };
        };

        let signal = match self.aggregator.aggregate(&snapshot) {
            Ok(signal) => signal
                .with_price_change(price_change_pct(&retained))
                .with_timeframes(self.timeframes.evaluate(&self.engine, &self.aggregator, &retained)),
            Err(e) => {
                ctx.health.record_failure(pair_id, Utc::now(), &e.to_string());
                return CycleOutcome::Rejected(e);
            }
        };
        if let Some(ref metrics) = ctx.metrics {
            metrics.signals_generated_total.inc();
        }

        // DISPATCHING
        self.set_phase(pair_id, PairPhase::Dispatching);
        let report = ctx.dispatcher.dispatch(&signal).await;
        for _ in &report.failures {
            ctx.health.record_delivery_failure(pair_id);
        }
        if let Some(ref metrics) = ctx.metrics {
            metrics
                .delivery_failures_total
                .inc_by(report.failures.len() as u64);
            if report.delivered > 0 {
                metrics.signals_dispatched_total.inc();
            }
        }

        if report.delivered > 0 {
            info!(
                pair_id = %pair_id,
                direction = %signal.direction,
                strength = signal.strength,
                delivered = report.delivered,
                "PairScheduler: signal dispatched"
            );
        } else {
            debug!(
                pair_id = %pair_id,
                direction = %signal.direction,
                strength = signal.strength,
                filtered = report.filtered,
                "PairScheduler: signal not delivered"
            );
        }

        CycleOutcome::Dispatched {
            snapshot,
            signal,
            report,
        }
    }

    fn feed_failed(&self, pair_id: &str, feed_name: &str, e: FeedError) -> CycleOutcome {
        let now = Utc::now();
        self.ctx.health.record_feed_failure(feed_name, now);
        self.ctx.health.record_failure(pair_id, now, &e.to_string());
        CycleOutcome::FeedFailed(e)
    }
}

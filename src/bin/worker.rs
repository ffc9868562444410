//! Pairsignal Worker
//!
//! Runs the pair scheduler, the watchdog and the monitoring HTTP surface in
//! one process. Market data and messaging are sandbox collaborators here;
//! real deployments inject their own `DataFeed`, `UserStore` and `Messenger`.

use dotenvy::dotenv;
use pairsignal::config::AppConfig;
use pairsignal::core::{AppState, PairScheduler, PipelineContext, RuntimeConfig, SignalRuntime};
use pairsignal::feed::{DataFeed, SyntheticFeed};
use pairsignal::health::HealthMonitor;
use pairsignal::indicators::IndicatorEngine;
use pairsignal::logging;
use pairsignal::metrics::Metrics;
use pairsignal::notify::{LogMessenger, NotificationDispatcher, StaticUserStore, Subscriber};
use pairsignal::signals::{SignalAggregator, TimeframeAnalyzer};
use pairsignal::store::PriceSeriesStore;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    let config = AppConfig::from_env()?;
    logging::init_logging(&config.environment);

    info!("Starting Pairsignal Worker");
    info!(environment = %config.environment, "Environment");
    info!(
        pairs = config.scheduler.pairs.len(),
        interval_secs = config.scheduler.interval.as_secs(),
        max_concurrency = config.scheduler.max_concurrency,
        retention = config.retention(),
        "Configuration loaded"
    );

    let metrics = Arc::new(Metrics::new()?);
    let health = Arc::new(HealthMonitor::new(config.health).with_metrics(metrics.clone()));
    let store = Arc::new(PriceSeriesStore::new(config.retention()));

    let feed: Arc<dyn DataFeed> = Arc::new(SyntheticFeed::new(
        chrono::Duration::minutes(1),
        config.retention(),
    ));

    // SUBSCRIBERS=user:locale,user:locale subscribes each user to every pair
    let mut users = StaticUserStore::new();
    for entry in env::var("SUBSCRIBERS").unwrap_or_default().split(',') {
        let mut parts = entry.trim().splitn(2, ':');
        if let (Some(user), locale) = (parts.next().filter(|u| !u.is_empty()), parts.next()) {
            users = users.subscribe_all(Subscriber::new(user, locale.unwrap_or("en")));
        }
    }
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(users),
        Arc::new(LogMessenger::default()),
        config.dispatch,
    ));

    let ctx = PipelineContext::new(feed, store, health.clone(), dispatcher)
        .with_metrics(metrics.clone());
    let scheduler = Arc::new(PairScheduler::new(
        config.scheduler.clone(),
        IndicatorEngine::new(config.indicators),
        SignalAggregator::new(config.thresholds),
        ctx,
    )?
    .with_timeframes(TimeframeAnalyzer::new(config.timeframes.clone())));

    let runtime = SignalRuntime::new(
        RuntimeConfig {
            evaluation_interval: config.scheduler.interval,
            watchdog_interval: config.watchdog_interval,
            ..RuntimeConfig::default()
        },
        scheduler.clone(),
        health.clone(),
    );
    let handles = runtime.start();

    let state = AppState::new(health, metrics).with_scheduler(scheduler.clone());
    let http_port = config.http_port;
    let http_shutdown = scheduler.shutdown_signal();
    let server = tokio::spawn(async move {
        if let Err(e) = pairsignal::core::start_server(state, http_port, http_shutdown).await {
            error!(error = %e, "Monitoring server failed");
        }
    });

    info!("Worker started, waiting for shutdown signal...");
    signal::ctrl_c().await?;

    info!("Shutting down worker...");
    runtime.shutdown();
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Task failed during shutdown");
        }
    }
    if let Err(e) = server.await {
        error!(error = %e, "Monitoring server task failed");
    }
    info!("Worker stopped");

    Ok(())
}

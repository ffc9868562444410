//! Integration tests for the pair scheduler

use crate::test_utils::{pair_names, FixedFeed, PipelineBuilder, RecordingMessenger, StepFeed};
use pairsignal::core::{CycleOutcome, PairPhase, SkipReason};
use pairsignal::error::FeedError;
use pairsignal::indicators::IndicatorEngine;
use pairsignal::models::{HealthStatus, IndicatorSnapshot};
use pairsignal::signals::price_change_pct;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn warm_up_reports_not_ready_then_dispatches() {
    let pipeline = PipelineBuilder::new(pair_names(1), Arc::new(StepFeed::new(20))).build();

    let first = pipeline.scheduler.run_round().await;
    assert!(matches!(
        first[0].1,
        CycleOutcome::NotReady {
            available: 20,
            required: 35
        }
    ));

    let second = pipeline.scheduler.run_round().await;
    let signal = second[0].1.signal().expect("signal after warm-up");
    assert_eq!(signal.pair_id, "P00/USD");
    assert!((0.0..=1.0).contains(&signal.strength));
    assert_eq!(pipeline.store.len("P00/USD"), 40);
}

#[tokio::test]
async fn repeated_history_yields_no_new_data() {
    let pipeline = PipelineBuilder::new(pair_names(1), Arc::new(FixedFeed::new(60))).build();

    let first = pipeline.scheduler.run_round().await;
    assert!(matches!(first[0].1, CycleOutcome::Dispatched { .. }));

    let second = pipeline.scheduler.run_round().await;
    assert!(matches!(second[0].1, CycleOutcome::NoNewData));
    assert_eq!(pipeline.store.len("P00/USD"), 60);
    assert_eq!(pipeline.metrics.rejected_bars_total.get(), 60);
}

#[tokio::test]
async fn failing_pair_is_isolated_and_suspended() {
    let pairs = pair_names(30);
    let feed = Arc::new(StepFeed::new(40).failing("P07/USD"));
    let pipeline = PipelineBuilder::new(pairs.clone(), feed.clone()).build();

    for round in 0..5 {
        let outcomes = pipeline.scheduler.run_round().await;
        for (pair_id, outcome) in &outcomes {
            if pair_id == "P07/USD" {
                assert!(matches!(outcome, CycleOutcome::FeedFailed(FeedError::Unavailable { .. })));
            } else {
                assert!(
                    matches!(outcome, CycleOutcome::Dispatched { .. }),
                    "round {} pair {}: {:?}",
                    round,
                    pair_id,
                    outcome
                );
            }
        }
    }

    let bad = pipeline.health.pair_state("P07/USD").unwrap();
    assert_eq!(bad.status, HealthStatus::Suspended);
    assert_eq!(bad.consecutive_failures, 5);
    assert!(bad.next_retry_at.is_some());

    let outcomes = pipeline.scheduler.run_round().await;
    let skipped = outcomes.iter().find(|(p, _)| p == "P07/USD").unwrap();
    assert!(matches!(skipped.1, CycleOutcome::Skipped(SkipReason::InBackoff)));
    assert_eq!(pipeline.scheduler.phase("P07/USD"), Some(PairPhase::Idle));
    assert_eq!(pipeline.metrics.pair_cycles_skipped_total.get(), 1);
    assert_eq!(feed.calls("P00/USD"), 6);

    for pair_id in pairs.iter().filter(|p| *p != "P07/USD") {
        assert_eq!(
            pipeline.health.pair_state(pair_id).unwrap().status,
            HealthStatus::Healthy
        );
    }
    let report = pipeline.health.liveness(chrono::Utc::now());
    assert_eq!(report.pairs_total, 30);
    assert_eq!(report.pairs_suspended, 1);
}

#[tokio::test]
async fn hanging_feed_times_out_without_blocking_other_pairs() {
    let feed = Arc::new(StepFeed::new(40).hanging("P03/USD"));
    let mut builder = PipelineBuilder::new(pair_names(10), feed);
    builder.feed_timeout = Duration::from_millis(200);
    let pipeline = builder.build();

    let started = Instant::now();
    let outcomes = pipeline.scheduler.run_round().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    for (pair_id, outcome) in &outcomes {
        if pair_id == "P03/USD" {
            assert!(matches!(outcome, CycleOutcome::FeedFailed(FeedError::Timeout { .. })));
        } else {
            assert!(matches!(outcome, CycleOutcome::Dispatched { .. }));
        }
    }
    assert_eq!(
        pipeline.health.pair_state("P03/USD").unwrap().status,
        HealthStatus::Degraded
    );
    assert_eq!(pipeline.store.len("P03/USD"), 0);
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let feed = Arc::new(StepFeed::new(40).with_delay(Duration::from_millis(50)));
    let mut builder = PipelineBuilder::new(pair_names(12), feed.clone());
    builder.max_concurrency = 3;
    let pipeline = builder.build();

    let outcomes = pipeline.scheduler.run_round().await;
    assert!(outcomes
        .iter()
        .all(|(_, o)| matches!(o, CycleOutcome::Dispatched { .. })));
    assert!(feed.max_in_flight() <= 3);
    assert!(feed.max_in_flight() >= 1);
}

#[tokio::test]
async fn in_flight_pair_is_skipped_and_shutdown_cancels_fetch() {
    let feed = Arc::new(StepFeed::new(40).hanging("P00/USD"));
    let mut builder = PipelineBuilder::new(pair_names(1), feed);
    builder.feed_timeout = Duration::from_secs(30);
    let pipeline = builder.build();
    let scheduler = pipeline.scheduler.clone();

    let running = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_cycle("P00/USD").await })
    };
    for _ in 0..200 {
        if scheduler.phase("P00/USD") == Some(PairPhase::Fetching) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(scheduler.phase("P00/USD"), Some(PairPhase::Fetching));

    let second = scheduler.run_cycle("P00/USD").await;
    assert!(matches!(second, CycleOutcome::Skipped(SkipReason::InFlight)));

    scheduler.shutdown();
    let first = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("cycle observed shutdown")
        .unwrap();
    assert!(matches!(first, CycleOutcome::Cancelled));
    assert_eq!(pipeline.store.len("P00/USD"), 0);
    assert_eq!(scheduler.phase("P00/USD"), Some(PairPhase::Idle));

    let after = scheduler.run_cycle("P00/USD").await;
    assert!(matches!(after, CycleOutcome::Skipped(SkipReason::ShuttingDown)));
}

#[tokio::test]
async fn retention_bounds_the_store_across_rounds() {
    let pipeline = PipelineBuilder::new(pair_names(2), Arc::new(StepFeed::new(40))).build();

    for _ in 0..5 {
        let outcomes = pipeline.scheduler.run_round().await;
        assert!(outcomes
            .iter()
            .all(|(_, o)| matches!(o, CycleOutcome::Dispatched { .. })));
    }
    assert_eq!(pipeline.store.len("P00/USD"), 85);
    let last = pipeline.store.last_timestamp("P00/USD").unwrap();
    let window = pipeline.store.window("P00/USD", 35).unwrap();
    assert_eq!(window.last().unwrap().timestamp, last);
}

#[tokio::test]
async fn delivery_failures_are_recorded_without_degrading_pair() {
    let pipeline = PipelineBuilder::new(pair_names(1), Arc::new(StepFeed::new(40)))
        .with_messenger(Arc::new(RecordingMessenger::failing_for("alice")))
        .build();

    let outcomes = pipeline.scheduler.run_round().await;
    match &outcomes[0].1 {
        CycleOutcome::Dispatched { report, .. } => {
            assert_eq!(report.attempted, 1);
            assert_eq!(report.delivered, 0);
            assert_eq!(report.failures.len(), 1);
        }
        other => panic!("expected dispatch, got {:?}", other),
    }
    assert_eq!(pipeline.health.delivery_failures("P00/USD"), 1);
    assert_eq!(
        pipeline.health.pair_state("P00/USD").unwrap().status,
        HealthStatus::Healthy
    );
    assert_eq!(pipeline.metrics.delivery_failures_total.get(), 1);
}

#[tokio::test]
async fn delivered_signals_reach_the_messenger() {
    let messenger = Arc::new(RecordingMessenger::default());
    let pipeline = PipelineBuilder::new(pair_names(3), Arc::new(StepFeed::new(40)))
        .with_messenger(messenger.clone())
        .build();

    pipeline.scheduler.run_round().await;
    let sent = messenger.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|(user, _)| user == "alice"));
    assert_eq!(pipeline.metrics.signals_generated_total.get(), 3);
}

fn assert_close(a: Option<f64>, b: Option<f64>, what: &str) {
    match (a, b) {
        (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9, "{what}: {a} vs {b}"),
        (a, b) => assert_eq!(a, b, "{what}"),
    }
}

fn assert_same_values(carried: &IndicatorSnapshot, full: &IndicatorSnapshot) {
    assert_eq!(carried.timestamp, full.timestamp);
    assert_close(carried.rsi, full.rsi, "rsi");
    assert_close(carried.ema.map(|e| e.short), full.ema.map(|e| e.short), "ema short");
    assert_close(carried.ema.map(|e| e.long), full.ema.map(|e| e.long), "ema long");
    assert_close(carried.macd.map(|m| m.line), full.macd.map(|m| m.line), "macd line");
    assert_close(carried.macd.map(|m| m.signal), full.macd.map(|m| m.signal), "macd signal");
    assert_eq!(carried.bollinger, full.bollinger);
}

#[tokio::test]
async fn snapshots_match_recomputation_over_retained_window() {
    let pipeline = PipelineBuilder::new(pair_names(1), Arc::new(StepFeed::new(40))).build();
    let engine = IndicatorEngine::default();

    for round in 0..6 {
        let outcomes = pipeline.scheduler.run_round().await;
        let snapshot = outcomes[0].1.snapshot().expect("dispatched every round");
        let retained = pipeline.store.retained("P00/USD");
        assert_eq!(retained.len(), (40 * (round + 1)).min(85));

        let full = engine.compute(&retained).unwrap();
        assert_same_values(snapshot, &full);
    }
}

#[tokio::test]
async fn abandoned_cycle_rebuilds_the_same_values() {
    let steady = PipelineBuilder::new(
        pair_names(1),
        Arc::new(StepFeed::new(40).with_delay(Duration::from_millis(200))),
    )
    .build();
    let interrupted = PipelineBuilder::new(
        pair_names(1),
        Arc::new(StepFeed::new(40).with_delay(Duration::from_millis(200))),
    )
    .build();

    for _ in 0..3 {
        steady.scheduler.run_round().await;
        interrupted.scheduler.run_round().await;
    }

    let scheduler = interrupted.scheduler.clone();
    let running = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_cycle("P00/USD").await })
    };
    for _ in 0..100 {
        if scheduler.phase("P00/USD") == Some(PairPhase::Fetching) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    running.abort();
    assert!(running.await.unwrap_err().is_cancelled());
    assert_eq!(scheduler.phase("P00/USD"), Some(PairPhase::Idle));

    let expected = steady.scheduler.run_round().await;
    let rebuilt = interrupted.scheduler.run_round().await;
    assert_eq!(
        steady.store.retained("P00/USD"),
        interrupted.store.retained("P00/USD")
    );
    assert_eq!(expected[0].1.snapshot(), rebuilt[0].1.snapshot());
    assert!(rebuilt[0].1.snapshot().is_some());
}

#[tokio::test]
async fn signals_carry_price_change_and_timeframes() {
    let mut builder = PipelineBuilder::new(pair_names(1), Arc::new(StepFeed::new(40)));
    builder.timeframes = vec![5, 15, 30, 200];
    let pipeline = builder.build();

    pipeline.scheduler.run_round().await;
    let outcomes = pipeline.scheduler.run_round().await;
    let signal = outcomes[0].1.signal().unwrap();
    let retained = pipeline.store.retained("P00/USD");

    assert_eq!(signal.price_change, price_change_pct(&retained));
    let lookbacks: Vec<usize> = signal.timeframes.iter().map(|t| t.lookback).collect();
    assert_eq!(lookbacks, vec![5, 15, 30, 200]);
    assert_eq!(
        signal.timeframes[0].price_change,
        price_change_pct(&retained[retained.len() - 5..])
    );
    assert!(signal
        .timeframes
        .iter()
        .all(|t| (0.0..=1.0).contains(&t.strength)));
    assert_eq!(signal.timeframes[3].price_change, 0.0);
    assert_eq!(signal.timeframes[3].strength, 0.0);
}

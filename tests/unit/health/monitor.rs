//! Unit tests for pair health transitions, backoff and liveness

use chrono::{DateTime, Duration, TimeZone, Utc};
use pairsignal::health::{HealthConfig, HealthMonitor};
use pairsignal::models::HealthStatus;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap()
}

fn monitor() -> HealthMonitor {
    HealthMonitor::new(HealthConfig::default())
}

#[test]
fn test_first_failure_degrades() {
    let monitor = monitor();
    let state = monitor.record_failure("EUR/USD", t0(), "timeout");
    assert_eq!(state.status, HealthStatus::Degraded);
    assert_eq!(state.consecutive_failures, 1);
    assert!(monitor.should_attempt("EUR/USD", t0()));
}

#[test]
fn test_threshold_failures_suspend_until_backoff_elapses() {
    let monitor = monitor();
    for i in 0..5 {
        monitor.record_failure("EUR/USD", t0() + Duration::seconds(i), "timeout");
    }
    let state = monitor.pair_state("EUR/USD").unwrap();
    let failed_at = t0() + Duration::seconds(4);
    assert_eq!(state.status, HealthStatus::Suspended);
    assert_eq!(state.next_retry_at, Some(failed_at + Duration::seconds(30)));

    assert!(!monitor.should_attempt("EUR/USD", failed_at + Duration::seconds(29)));
    assert!(monitor.should_attempt("EUR/USD", failed_at + Duration::seconds(30)));
}

#[test]
fn test_failed_retry_doubles_backoff() {
    let monitor = monitor();
    for _ in 0..5 {
        monitor.record_failure("EUR/USD", t0(), "down");
    }
    let retry_at = t0() + Duration::seconds(30);
    let state = monitor.record_failure("EUR/USD", retry_at, "still down");
    assert_eq!(state.next_retry_at, Some(retry_at + Duration::seconds(60)));
}

#[test]
fn test_success_resets_to_healthy() {
    let monitor = monitor();
    for _ in 0..5 {
        monitor.record_failure("EUR/USD", t0(), "down");
    }
    let recovered_at = t0() + Duration::minutes(1);
    monitor.record_success("EUR/USD", recovered_at);

    let state = monitor.pair_state("EUR/USD").unwrap();
    assert_eq!(state.status, HealthStatus::Healthy);
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.last_success_at, Some(recovered_at));
    assert!(state.next_retry_at.is_none());

    // backoff restarts from the base after recovery
    for _ in 0..5 {
        monitor.record_failure("EUR/USD", recovered_at, "down");
    }
    let state = monitor.pair_state("EUR/USD").unwrap();
    assert_eq!(state.next_retry_at, Some(recovered_at + Duration::seconds(30)));
}

#[test]
fn test_unknown_pair_may_attempt() {
    assert!(monitor().should_attempt("XAU/USD", t0()));
}

#[test]
fn test_liveness_ratio_and_threshold() {
    let monitor = monitor();
    monitor.register_pairs(["A/B", "C/D", "E/F", "G/H"]);
    assert_eq!(monitor.liveness(t0()).liveness, 1.0);

    monitor.record_failure("A/B", t0(), "x");
    monitor.record_failure("C/D", t0(), "x");
    let report = monitor.liveness(t0());
    assert_eq!(report.pairs_total, 4);
    assert_eq!(report.pairs_healthy, 2);
    assert_eq!(report.pairs_degraded, 2);
    assert_eq!(report.liveness, 0.5);
    assert!(!report.below_threshold);

    monitor.record_failure("E/F", t0(), "x");
    assert!(monitor.liveness(t0()).below_threshold);
}

#[test]
fn test_liveness_with_no_pairs_is_full() {
    let report = monitor().liveness(t0());
    assert_eq!(report.pairs_total, 0);
    assert_eq!(report.liveness, 1.0);
    assert!(!report.below_threshold);
}

#[test]
fn test_publish_liveness_notifies_subscribers() {
    let monitor = monitor();
    monitor.register_pairs(["A/B"]);
    let rx = monitor.subscribe();
    monitor.record_failure("A/B", t0(), "x");
    assert_eq!(rx.borrow().liveness, 0.0);
    assert!(rx.borrow().below_threshold);
}

#[test]
fn test_delivery_failures_do_not_change_status() {
    let monitor = monitor();
    monitor.register_pairs(["A/B"]);
    monitor.record_delivery_failure("A/B");
    monitor.record_delivery_failure("A/B");
    assert_eq!(monitor.delivery_failures("A/B"), 2);
    assert_eq!(monitor.pair_state("A/B").unwrap().status, HealthStatus::Healthy);
}

#[test]
fn test_config_validation() {
    assert!(HealthConfig::default().validate().is_ok());
    let inverted = HealthConfig {
        backoff_base: std::time::Duration::from_secs(60),
        backoff_cap: std::time::Duration::from_secs(10),
        ..HealthConfig::default()
    };
    assert!(inverted.validate().is_err());
}

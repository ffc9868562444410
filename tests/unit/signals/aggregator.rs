//! Unit tests for majority-vote aggregation

use chrono::{TimeZone, Utc};
use pairsignal::error::ConfigError;
use pairsignal::models::{
    BollingerBands, EmaPair, IndicatorName, IndicatorSnapshot, MacdValue, SignalDirection,
};
use pairsignal::signals::{SignalAggregator, SignalThresholds};

fn snapshot(close: f64) -> IndicatorSnapshot {
    IndicatorSnapshot::new("EUR/USD", Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(), close)
}

fn macd(previous_histogram: f64, histogram: f64) -> MacdValue {
    MacdValue {
        line: histogram,
        signal: 0.0,
        histogram,
        previous_histogram,
    }
}

fn bands(lower: f64, upper: f64) -> BollingerBands {
    BollingerBands {
        upper,
        middle: (upper + lower) / 2.0,
        lower,
    }
}

#[test]
fn test_unanimous_buy() {
    let snap = snapshot(1.0)
        .with_rsi(25.0)
        .with_macd(macd(-0.1, 0.2))
        .with_bollinger(bands(1.05, 1.2));
    let signal = SignalAggregator::default().aggregate(&snap).unwrap();
    assert_eq!(signal.direction, SignalDirection::Buy);
    assert_eq!(signal.strength, 1.0);
    assert_eq!(signal.triggering_indicators.len(), 3);
    assert_eq!(signal.price, 1.0);
}

#[test]
fn test_majority_sell_strength_is_fraction_of_votes() {
    let snap = snapshot(1.3)
        .with_rsi(80.0)
        .with_macd(macd(0.1, 0.05))
        .with_bollinger(bands(1.0, 1.2));
    let signal = SignalAggregator::default().aggregate(&snap).unwrap();
    assert_eq!(signal.direction, SignalDirection::Sell);
    assert!((signal.strength - 2.0 / 3.0).abs() < 1e-12);
    assert!(signal.triggering_indicators.contains(&IndicatorName::Rsi));
    assert!(signal.triggering_indicators.contains(&IndicatorName::Bollinger));
    assert!(!signal.triggering_indicators.contains(&IndicatorName::Macd));
}

#[test]
fn test_tie_is_neutral() {
    let snap = snapshot(1.3)
        .with_rsi(20.0)
        .with_bollinger(bands(1.0, 1.2));
    let signal = SignalAggregator::default().aggregate(&snap).unwrap();
    assert_eq!(signal.direction, SignalDirection::Neutral);
    assert_eq!(signal.strength, 0.0);
    assert!(signal.triggering_indicators.is_empty());
}

#[test]
fn test_no_votes_is_neutral() {
    let snap = snapshot(1.1).with_rsi(50.0).with_bollinger(bands(1.0, 1.2));
    let signal = SignalAggregator::default().aggregate(&snap).unwrap();
    assert_eq!(signal.direction, SignalDirection::Neutral);
    assert!(!signal.is_actionable());
}

#[test]
fn test_strength_stays_in_unit_interval() {
    let aggregator = SignalAggregator::default();
    for rsi in [5.0, 29.9, 30.0, 50.0, 70.0, 70.1, 95.0] {
        for close in [0.9, 1.1, 1.3] {
            let snap = snapshot(close)
                .with_rsi(rsi)
                .with_macd(macd(-0.1, 0.1))
                .with_bollinger(bands(1.0, 1.2));
            let signal = aggregator.aggregate(&snap).unwrap();
            assert!((0.0..=1.0).contains(&signal.strength));
        }
    }
}

#[test]
fn test_threshold_boundaries_are_strict() {
    let aggregator = SignalAggregator::default();
    let at_oversold = aggregator.aggregate(&snapshot(1.1).with_rsi(30.0)).unwrap();
    assert_eq!(at_oversold.direction, SignalDirection::Neutral);

    let on_band = aggregator
        .aggregate(&snapshot(1.0).with_bollinger(bands(1.0, 1.2)))
        .unwrap();
    assert_eq!(on_band.direction, SignalDirection::Neutral);

    let inclusive = SignalAggregator::new(SignalThresholds {
        bollinger_touch_inclusive: true,
        ..SignalThresholds::default()
    });
    let touched = inclusive
        .aggregate(&snapshot(1.0).with_bollinger(bands(1.0, 1.2)))
        .unwrap();
    assert_eq!(touched.direction, SignalDirection::Buy);
}

#[test]
fn test_collapsed_bands_do_not_vote() {
    let snap = snapshot(1.0).with_bollinger(bands(1.0, 1.0));
    let signal = SignalAggregator::default().aggregate(&snap).unwrap();
    assert_eq!(signal.direction, SignalDirection::Neutral);
}

#[test]
fn test_ema_votes_only_when_enabled() {
    let snap = snapshot(1.1).with_ema(EmaPair {
        short: 1.12,
        long: 1.10,
    });
    let disabled = SignalAggregator::default().aggregate(&snap).unwrap();
    assert_eq!(disabled.direction, SignalDirection::Neutral);

    let enabled = SignalAggregator::new(SignalThresholds {
        ema_trend_threshold_pct: Some(0.5),
        ..SignalThresholds::default()
    });
    let signal = enabled.aggregate(&snap).unwrap();
    assert_eq!(signal.direction, SignalDirection::Buy);
    assert!(signal.triggering_indicators.contains(&IndicatorName::Ema));
}

#[test]
fn test_malformed_snapshot_is_rejected() {
    let aggregator = SignalAggregator::default();
    let missing_pair = IndicatorSnapshot::new("", Utc::now(), 1.0);
    assert!(matches!(
        aggregator.aggregate(&missing_pair),
        Err(ConfigError::MalformedSnapshot(_))
    ));
    assert!(aggregator.aggregate(&snapshot(f64::INFINITY)).is_err());
}

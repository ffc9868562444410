//! Unit tests for shared moving-average helpers

use pairsignal::common::math::{ema_multiplier, ema_series, sma, standard_deviation};

#[test]
fn test_ema_multiplier() {
    assert!((ema_multiplier(9) - 0.2).abs() < 1e-12);
    assert!((ema_multiplier(1) - 1.0).abs() < 1e-12);
}

#[test]
fn test_sma_needs_full_period() {
    assert_eq!(sma(&[1.0, 2.0], 3), None);
    assert_eq!(sma(&[1.0, 2.0, 3.0], 0), None);
    assert_eq!(sma(&[1.0, 2.0, 3.0, 6.0], 3), Some(11.0 / 3.0));
}

#[test]
fn test_ema_series_length_matches_values_after_seed() {
    let values: Vec<f64> = (1..=10).map(f64::from).collect();
    let series = ema_series(&values, 4);
    assert_eq!(series.len(), 7);
    assert!((series[0] - 2.5).abs() < 1e-12);
}

#[test]
fn test_standard_deviation_of_constant_is_zero() {
    assert_eq!(standard_deviation(&[3.0; 8], 5), Some(0.0));
}

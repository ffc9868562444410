//! Unit tests for Bollinger Bands indicator

use pairsignal::indicators::volatility::calculate_bollinger_bands;

#[test]
fn test_bollinger_insufficient_data() {
    assert!(calculate_bollinger_bands(&[1.0; 19], 20, 2.0).is_err());
}

#[test]
fn test_bollinger_uses_population_std_dev() {
    let bands = calculate_bollinger_bands(&[1.0, 2.0, 3.0, 4.0, 5.0], 5, 2.0).unwrap();
    let std = 2.0_f64.sqrt();
    assert!((bands.middle - 3.0).abs() < 1e-12);
    assert!((bands.upper - (3.0 + 2.0 * std)).abs() < 1e-12);
    assert!((bands.lower - (3.0 - 2.0 * std)).abs() < 1e-12);
}

#[test]
fn test_bollinger_constant_series_collapses() {
    let bands = calculate_bollinger_bands(&[1.25; 25], 20, 2.0).unwrap();
    assert_eq!(bands.upper, bands.middle);
    assert_eq!(bands.lower, bands.middle);
}

#[test]
fn test_bollinger_only_uses_last_period() {
    let mut closes = vec![100.0; 10];
    closes.extend([1.0; 20]);
    let bands = calculate_bollinger_bands(&closes, 20, 2.0).unwrap();
    assert!((bands.middle - 1.0).abs() < 1e-12);
}

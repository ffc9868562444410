//! Unit tests for the per-pair price series and the shared store

use chrono::{DateTime, Duration, TimeZone, Utc};
use pairsignal::error::DataError;
use pairsignal::models::PriceBar;
use pairsignal::store::{PriceSeries, PriceSeriesStore};

fn ts(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

fn bar(pair: &str, minute: i64, close: f64) -> PriceBar {
    PriceBar::from_close(pair, ts(minute), close)
}

#[test]
fn test_append_preserves_order() {
    let mut series = PriceSeries::new("EUR/USD", 10);
    for i in 0..5 {
        series.append(bar("EUR/USD", i, 1.0 + i as f64)).unwrap();
    }
    let window = series.window(5).unwrap();
    assert!(window.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(series.last_timestamp(), Some(ts(4)));
}

#[test]
fn test_out_of_order_is_rejected_and_series_unchanged() {
    let mut series = PriceSeries::new("EUR/USD", 10);
    series.append(bar("EUR/USD", 5, 1.1)).unwrap();

    let older = series.append(bar("EUR/USD", 3, 1.2));
    assert!(matches!(older, Err(DataError::OutOfOrder { .. })));

    let duplicate = series.append(bar("EUR/USD", 5, 1.3));
    assert!(matches!(duplicate, Err(DataError::OutOfOrder { .. })));

    assert_eq!(series.len(), 1);
    assert_eq!(series.closes(), vec![1.1]);
}

#[test]
fn test_wrong_pair_and_malformed_bars_are_rejected() {
    let mut series = PriceSeries::new("EUR/USD", 10);
    assert!(matches!(
        series.append(bar("GBP/USD", 0, 1.0)),
        Err(DataError::WrongPair { .. })
    ));
    assert!(matches!(
        series.append(bar("EUR/USD", 0, f64::NAN)),
        Err(DataError::Malformed { .. })
    ));
    assert!(series.is_empty());
}

#[test]
fn test_eviction_is_fifo_at_retention() {
    let mut series = PriceSeries::new("EUR/USD", 3);
    for i in 0..5 {
        series.append(bar("EUR/USD", i, i as f64 + 1.0)).unwrap();
    }
    assert_eq!(series.len(), 3);
    assert_eq!(series.closes(), vec![3.0, 4.0, 5.0]);
}

#[test]
fn test_window_reports_insufficient_data() {
    let mut series = PriceSeries::new("EUR/USD", 10);
    series.append(bar("EUR/USD", 0, 1.0)).unwrap();
    let err = series.window(4).unwrap_err();
    assert_eq!(err.required, 4);
    assert_eq!(err.available, 1);
}

#[test]
fn test_store_partitions_are_independent() {
    let store = PriceSeriesStore::new(5);
    store.append("EUR/USD", bar("EUR/USD", 0, 1.0)).unwrap();
    store.append("EUR/USD", bar("EUR/USD", 1, 1.1)).unwrap();
    store.append("USD/JPY", bar("USD/JPY", 0, 150.0)).unwrap();

    assert_eq!(store.len("EUR/USD"), 2);
    assert_eq!(store.len("USD/JPY"), 1);
    assert_eq!(store.len("GBP/USD"), 0);
    assert!(store.window("GBP/USD", 1).is_err());
    assert_eq!(store.last_timestamp("USD/JPY"), Some(ts(0)));

    store.clear("EUR/USD");
    assert_eq!(store.len("EUR/USD"), 0);
    assert_eq!(store.len("USD/JPY"), 1);
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped OHLC bar for a pair. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub pair_id: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// FX feeds frequently report no volume.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume: Option<f64>,
}

impl PriceBar {
    pub fn new(
        pair_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Self {
        Self {
            pair_id: pair_id.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    /// Flat bar where open, high, low and close are all `close`.
    pub fn from_close(pair_id: impl Into<String>, timestamp: DateTime<Utc>, close: f64) -> Self {
        Self::new(pair_id, timestamp, close, close, close, close)
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Reason the bar cannot be stored, if any.
    pub fn validation_error(&self) -> Option<&'static str> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Some("non-finite price");
        }
        if self.high < self.low {
            return Some("high below low");
        }
        if self.volume.is_some_and(|v| !v.is_finite() || v < 0.0) {
            return Some("invalid volume");
        }
        None
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    /// Histogram of the previous bar; a sign change marks a crossing.
    pub previous_histogram: f64,
}

impl MacdValue {
    pub fn crossed_above(&self) -> bool {
        self.previous_histogram <= 0.0 && self.histogram > 0.0
    }

    pub fn crossed_below(&self) -> bool {
        self.previous_histogram >= 0.0 && self.histogram < 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaPair {
    pub short: f64,
    pub long: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Indicator values for one pair at one bar. A fresh snapshot is built every
/// cycle; fields are `None` while their calculator lacks history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub pair_id: String,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema: Option<EmaPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<BollingerBands>,
}

impl IndicatorSnapshot {
    pub fn new(pair_id: impl Into<String>, timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            pair_id: pair_id.into(),
            timestamp,
            close,
            rsi: None,
            macd: None,
            ema: None,
            bollinger: None,
        }
    }

    pub fn with_rsi(mut self, rsi: f64) -> Self {
        self.rsi = Some(rsi);
        self
    }

    pub fn with_macd(mut self, macd: MacdValue) -> Self {
        self.macd = Some(macd);
        self
    }

    pub fn with_ema(mut self, ema: EmaPair) -> Self {
        self.ema = Some(ema);
        self
    }

    pub fn with_bollinger(mut self, bollinger: BollingerBands) -> Self {
        self.bollinger = Some(bollinger);
        self
    }
}

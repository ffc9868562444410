use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalDirection {
    Buy,
    Sell,
    Neutral,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalDirection::Buy => "BUY",
            SignalDirection::Sell => "SELL",
            SignalDirection::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorName {
    Rsi,
    Macd,
    Ema,
    Bollinger,
}

impl IndicatorName {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorName::Rsi => "rsi",
            IndicatorName::Macd => "macd",
            IndicatorName::Ema => "ema",
            IndicatorName::Bollinger => "bollinger",
        }
    }
}

impl fmt::Display for IndicatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional recommendation derived from exactly one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub pair_id: String,
    pub timestamp: DateTime<Utc>,
    pub direction: SignalDirection,
    /// Fraction of voting indicators that agree with `direction`, in `[0, 1]`.
    pub strength: f64,
    pub triggering_indicators: BTreeSet<IndicatorName>,
    /// Close of the bar the signal was computed on.
    pub price: f64,
    /// Percent change of the close across the evaluated window.
    #[serde(default)]
    pub price_change: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeframes: Vec<TimeframeSignal>,
}

/// Direction over one trailing lookback, aggregated the same way as the
/// pair signal but from only the last `lookback` bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSignal {
    /// Trailing bars evaluated.
    pub lookback: usize,
    pub direction: SignalDirection,
    pub strength: f64,
    pub price_change: f64,
}

impl Signal {
    pub fn neutral(pair_id: impl Into<String>, timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            pair_id: pair_id.into(),
            timestamp,
            direction: SignalDirection::Neutral,
            strength: 0.0,
            triggering_indicators: BTreeSet::new(),
            price,
            price_change: 0.0,
            timeframes: Vec::new(),
        }
    }

    pub fn with_price_change(mut self, price_change: f64) -> Self {
        self.price_change = price_change;
        self
    }

    pub fn with_timeframes(mut self, timeframes: Vec<TimeframeSignal>) -> Self {
        self.timeframes = timeframes;
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != SignalDirection::Neutral
    }
}

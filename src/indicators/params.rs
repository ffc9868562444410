use serde::{Deserialize, Serialize};

/// Periods and multipliers for the indicator suite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub ema_short_period: usize,
    pub ema_long_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ema_short_period: 7,
            ema_long_period: 21,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_k: 2.0,
        }
    }
}

impl IndicatorParams {
    /// Bars needed before every indicator in the suite has a value.
    pub fn required_history(&self) -> usize {
        [
            self.rsi_period + 1,
            self.ema_short_period,
            self.ema_long_period,
            self.macd_slow + self.macd_signal,
            self.bollinger_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
    }

    /// Buffer length to retain per pair: the longest requirement plus margin.
    pub fn retention(&self, warmup_margin: usize) -> usize {
        self.required_history() + warmup_margin
    }
}

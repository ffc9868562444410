//! Per-indicator directional votes.

use crate::error::ConfigError;
use crate::models::{IndicatorName, IndicatorSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Buy,
    Sell,
}

/// Vote cast by one indicator that has a value. `vote` is `None` when the
/// value sits inside the neutral zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorVote {
    pub indicator: IndicatorName,
    pub vote: Option<Vote>,
}

/// Voting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// RSI strictly below this votes BUY.
    pub rsi_oversold: f64,
    /// RSI strictly above this votes SELL.
    pub rsi_overbought: f64,
    /// Count a close exactly on a band as a touch.
    pub bollinger_touch_inclusive: bool,
    /// When set, the EMA short/long spread (in percent of the long EMA)
    /// votes once it exceeds this magnitude.
    pub ema_trend_threshold_pct: Option<f64>,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            bollinger_touch_inclusive: false,
            ema_trend_threshold_pct: None,
        }
    }
}

impl SignalThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.rsi_oversold) || !in_range(self.rsi_overbought) {
            return Err(ConfigError::Inconsistent(format!(
                "RSI thresholds must lie in [0, 100], got {} / {}",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(ConfigError::Inconsistent(format!(
                "RSI oversold {} must be below overbought {}",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        if let Some(pct) = self.ema_trend_threshold_pct {
            if !pct.is_finite() || pct < 0.0 {
                return Err(ConfigError::Inconsistent(format!(
                    "EMA trend threshold must be a non-negative percentage, got {}",
                    pct
                )));
            }
        }
        Ok(())
    }

    /// Votes of every indicator present in the snapshot. Absent indicators
    /// (and the EMA when trend voting is disabled) are left out entirely.
    pub fn votes(&self, snapshot: &IndicatorSnapshot) -> Vec<IndicatorVote> {
        let mut votes = Vec::with_capacity(4);

        if let Some(rsi) = snapshot.rsi {
            let vote = if rsi < self.rsi_oversold {
                Some(Vote::Buy)
            } else if rsi > self.rsi_overbought {
                Some(Vote::Sell)
            } else {
                None
            };
            votes.push(IndicatorVote {
                indicator: IndicatorName::Rsi,
                vote,
            });
        }

        if let Some(macd) = snapshot.macd {
            let vote = if macd.crossed_above() {
                Some(Vote::Buy)
            } else if macd.crossed_below() {
                Some(Vote::Sell)
            } else {
                None
            };
            votes.push(IndicatorVote {
                indicator: IndicatorName::Macd,
                vote,
            });
        }

        if let Some(bands) = snapshot.bollinger {
            let close = snapshot.close;
            let (below, above) = if self.bollinger_touch_inclusive {
                (close <= bands.lower, close >= bands.upper)
            } else {
                (close < bands.lower, close > bands.upper)
            };
            // Collapsed bands (zero variance) carry no information.
            let vote = if bands.upper == bands.lower {
                None
            } else if below {
                Some(Vote::Buy)
            } else if above {
                Some(Vote::Sell)
            } else {
                None
            };
            votes.push(IndicatorVote {
                indicator: IndicatorName::Bollinger,
                vote,
            });
        }

        if let (Some(threshold), Some(ema)) = (self.ema_trend_threshold_pct, snapshot.ema) {
            let vote = if ema.long == 0.0 {
                None
            } else {
                let spread_pct = (ema.short - ema.long) / ema.long * 100.0;
                if spread_pct > threshold {
                    Some(Vote::Buy)
                } else if spread_pct < -threshold {
                    Some(Vote::Sell)
                } else {
                    None
                }
            };
            votes.push(IndicatorVote {
                indicator: IndicatorName::Ema,
                vote,
            });
        }

        votes
    }
}

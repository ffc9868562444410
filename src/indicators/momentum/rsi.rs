//! RSI (Relative Strength Index) with Wilder smoothing

use crate::error::InsufficientData;

/// RSI when neither gains nor losses occurred over the window.
pub const NEUTRAL_RSI: f64 = 50.0;

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return NEUTRAL_RSI;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

fn split_change(change: f64) -> (f64, f64) {
    if change > 0.0 {
        (change, 0.0)
    } else {
        (0.0, -change)
    }
}

/// RSI of the last close.
///
/// The seed averages are the simple means of the first `period` changes;
/// every later change is folded in as `(avg * (period - 1) + x) / period`.
/// Needs `period + 1` closes.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Result<f64, InsufficientData> {
    rsi_series(closes, period)
        .last()
        .copied()
        .flatten()
        .ok_or(InsufficientData {
            required: period + 1,
            available: closes.len(),
        })
}

/// RSI aligned with `closes`; the first `period` entries are `None`.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let (gain, loss) = split_change(closes[i] - closes[i - 1]);
        avg_gain += gain;
        avg_loss += loss;
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    let n = period as f64;
    for i in period + 1..closes.len() {
        let (gain, loss) = split_change(closes[i] - closes[i - 1]);
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }
    out
}

/// Running Wilder RSI carried from one cycle to the next.
#[derive(Debug, Clone)]
pub struct RsiState {
    period: usize,
    prev_close: Option<f64>,
    changes_seen: usize,
    avg_gain: f64,
    avg_loss: f64,
    value: Option<f64>,
}

impl RsiState {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev_close: None,
            changes_seen: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let Some(prev) = self.prev_close.replace(close) else {
            return None;
        };
        let (gain, loss) = split_change(close - prev);
        let n = self.period as f64;
        self.changes_seen += 1;

        if self.changes_seen < self.period {
            self.avg_gain += gain;
            self.avg_loss += loss;
        } else if self.changes_seen == self.period {
            self.avg_gain = (self.avg_gain + gain) / n;
            self.avg_loss = (self.avg_loss + loss) / n;
            self.value = Some(rsi_from_averages(self.avg_gain, self.avg_loss));
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
            self.value = Some(rsi_from_averages(self.avg_gain, self.avg_loss));
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

//! MACD (Moving Average Convergence Divergence) indicator

use crate::common::math;
use crate::error::InsufficientData;
use crate::indicators::trend::EmaState;
use crate::models::MacdValue;

/// MACD at the last close.
///
/// line = EMA(fast) - EMA(slow), signal = EMA(signal) of the line,
/// histogram = line - signal. Needs `slow + signal` closes so that the
/// previous histogram is also defined.
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<MacdValue, InsufficientData> {
    let insufficient = InsufficientData {
        required: slow + signal,
        available: closes.len(),
    };
    if fast == 0 || slow == 0 || signal == 0 || closes.len() < slow + signal {
        return Err(insufficient);
    }

    let fast_series = math::ema_series(closes, fast);
    let slow_series = math::ema_series(closes, slow);
    let first = fast.max(slow) - 1;

    let line: Vec<f64> = (first..closes.len())
        .map(|t| fast_series[t + 1 - fast] - slow_series[t + 1 - slow])
        .collect();
    let signal_series = math::ema_series(&line, signal);
    if signal_series.len() < 2 {
        return Err(insufficient);
    }

    let last = signal_series.len() - 1;
    let line_now = line[line.len() - 1];
    let line_prev = line[line.len() - 2];
    let histogram = line_now - signal_series[last];

    Ok(MacdValue {
        line: line_now,
        signal: signal_series[last],
        histogram,
        previous_histogram: line_prev - signal_series[last - 1],
    })
}

/// Running MACD built from three incremental EMAs.
#[derive(Debug, Clone)]
pub struct MacdState {
    fast: EmaState,
    slow: EmaState,
    signal: EmaState,
    previous_histogram: Option<f64>,
    value: Option<MacdValue>,
}

impl MacdState {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: EmaState::new(fast),
            slow: EmaState::new(slow),
            signal: EmaState::new(signal),
            previous_histogram: None,
            value: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return None;
        };

        let line = fast - slow;
        let signal = self.signal.update(line)?;
        let histogram = line - signal;

        if let Some(previous_histogram) = self.previous_histogram {
            self.value = Some(MacdValue {
                line,
                signal,
                histogram,
                previous_histogram,
            });
        }
        self.previous_histogram = Some(histogram);
        self.value
    }

    pub fn value(&self) -> Option<MacdValue> {
        self.value
    }
}

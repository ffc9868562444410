//! EMA (Exponential Moving Average) indicator

use crate::common::math;
use crate::error::InsufficientData;

/// EMA of the last close, seeded with the SMA of the first `period` closes.
pub fn calculate_ema(closes: &[f64], period: usize) -> Result<f64, InsufficientData> {
    math::ema(closes, period).ok_or(InsufficientData {
        required: period,
        available: closes.len(),
    })
}

/// Incremental EMA. Accumulates the seed average, then applies the EMA step.
#[derive(Debug, Clone)]
pub struct EmaState {
    period: usize,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl EmaState {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            seed_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.seen += 1;
        match self.value {
            Some(prev) => {
                self.value = Some(math::ema_from_previous(value, prev, self.period));
            }
            None => {
                self.seed_sum += value;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

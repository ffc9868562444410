//! Full-recomputation indicator engine.

use crate::indicators::momentum::{calculate_macd, calculate_rsi};
use crate::indicators::params::IndicatorParams;
use crate::indicators::trend::calculate_ema;
use crate::indicators::volatility::calculate_bollinger_bands;
use crate::models::{EmaPair, IndicatorSnapshot, PriceBar};

/// Computes a snapshot from a window of bars with no carried state.
///
/// Any calculator lacking history leaves its field absent; the engine itself
/// never fails on a non-empty window.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Snapshot at the last bar of `window`. `None` only for an empty window.
    pub fn compute(&self, window: &[PriceBar]) -> Option<IndicatorSnapshot> {
        let last = window.last()?;
        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        let p = &self.params;

        let mut snapshot = IndicatorSnapshot::new(last.pair_id.clone(), last.timestamp, last.close);
        snapshot.rsi = calculate_rsi(&closes, p.rsi_period).ok();
        snapshot.macd = calculate_macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal).ok();
        snapshot.ema = match (
            calculate_ema(&closes, p.ema_short_period),
            calculate_ema(&closes, p.ema_long_period),
        ) {
            (Ok(short), Ok(long)) => Some(EmaPair { short, long }),
            _ => None,
        };
        snapshot.bollinger =
            calculate_bollinger_bands(&closes, p.bollinger_period, p.bollinger_k).ok();

        Some(snapshot)
    }
}

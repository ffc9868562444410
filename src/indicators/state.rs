//! Per-pair incremental indicator context.

use crate::indicators::momentum::{MacdState, RsiState};
use crate::indicators::params::IndicatorParams;
use crate::indicators::trend::EmaState;
use crate::indicators::volatility::calculate_bollinger_bands;
use crate::models::{EmaPair, IndicatorSnapshot, PriceBar};
use chrono::{DateTime, Utc};

/// Running RSI/EMA/MACD memory for one pair.
///
/// Owned by the pair's processing slot and advanced once per appended bar,
/// so a cycle costs O(new bars) while the store is filling. Values equal a
/// full recomputation over exactly the bars folded in since the first one,
/// so once the store evicts that bar the state must be rebuilt from the
/// retained window (see [`IndicatorState::tracks`]). Bollinger Bands have no
/// memory and are taken from the window at snapshot time.
#[derive(Debug, Clone)]
pub struct IndicatorState {
    params: IndicatorParams,
    rsi: RsiState,
    ema_short: EmaState,
    ema_long: EmaState,
    macd: MacdState,
    first_timestamp: Option<DateTime<Utc>>,
    last_timestamp: Option<DateTime<Utc>>,
    bars_seen: usize,
}

impl IndicatorState {
    pub fn new(params: IndicatorParams) -> Self {
        Self {
            params,
            rsi: RsiState::new(params.rsi_period),
            ema_short: EmaState::new(params.ema_short_period),
            ema_long: EmaState::new(params.ema_long_period),
            macd: MacdState::new(params.macd_fast, params.macd_slow, params.macd_signal),
            first_timestamp: None,
            last_timestamp: None,
            bars_seen: 0,
        }
    }

    /// Rebuild from scratch by replaying `bars`.
    pub fn from_bars(params: IndicatorParams, bars: &[PriceBar]) -> Self {
        let mut state = Self::new(params);
        for bar in bars {
            state.advance(bar);
        }
        state
    }

    /// Fold one bar in. Bars not newer than the last one are ignored and
    /// `false` is returned.
    pub fn advance(&mut self, bar: &PriceBar) -> bool {
        if self.last_timestamp.is_some_and(|last| bar.timestamp <= last) {
            return false;
        }
        self.rsi.update(bar.close);
        self.ema_short.update(bar.close);
        self.ema_long.update(bar.close);
        self.macd.update(bar.close);
        self.first_timestamp.get_or_insert(bar.timestamp);
        self.last_timestamp = Some(bar.timestamp);
        self.bars_seen += 1;
        true
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// Whether the state was folded from exactly `window`. Timestamps are
    /// strictly increasing on both sides, so matching endpoints and bar count
    /// identify the replayed sequence.
    pub fn tracks(&self, window: &[PriceBar]) -> bool {
        match (window.first(), window.last()) {
            (Some(first), Some(last)) => {
                self.bars_seen == window.len()
                    && self.first_timestamp == Some(first.timestamp)
                    && self.last_timestamp == Some(last.timestamp)
            }
            _ => self.bars_seen == 0,
        }
    }

    /// Re-seed from `window` unless the state already tracks it. Returns
    /// whether a re-seed happened.
    pub fn sync_to(&mut self, window: &[PriceBar]) -> bool {
        if self.tracks(window) {
            return false;
        }
        *self = Self::from_bars(self.params, window);
        true
    }

    /// Snapshot at the last advanced bar. `recent` must end with that bar and
    /// supplies the Bollinger window.
    pub fn snapshot(&self, recent: &[PriceBar]) -> Option<IndicatorSnapshot> {
        let last = recent.last()?;
        if Some(last.timestamp) != self.last_timestamp {
            return None;
        }

        let closes: Vec<f64> = recent.iter().map(|b| b.close).collect();
        let mut snapshot = IndicatorSnapshot::new(last.pair_id.clone(), last.timestamp, last.close);
        snapshot.rsi = self.rsi.value();
        snapshot.macd = self.macd.value();
        snapshot.ema = match (self.ema_short.value(), self.ema_long.value()) {
            (Some(short), Some(long)) => Some(EmaPair { short, long }),
            _ => None,
        };
        snapshot.bollinger = calculate_bollinger_bands(
            &closes,
            self.params.bollinger_period,
            self.params.bollinger_k,
        )
        .ok();
        Some(snapshot)
    }
}

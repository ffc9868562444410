//! Trailing-window evaluation over several lookbacks.

use crate::indicators::IndicatorEngine;
use crate::models::{PriceBar, Signal, SignalDirection, TimeframeSignal};
use crate::signals::SignalAggregator;

/// Percent change of the close from the first to the last bar. Zero for
/// fewer than two bars or a zero starting close.
pub fn price_change_pct(window: &[PriceBar]) -> f64 {
    match (window.first(), window.last()) {
        (Some(first), Some(last)) if window.len() > 1 && first.close != 0.0 => {
            (last.close - first.close) / first.close * 100.0
        }
        _ => 0.0,
    }
}

/// Re-runs the engine and the aggregator on the last `lookback` bars for
/// each configured lookback.
#[derive(Debug, Clone, Default)]
pub struct TimeframeAnalyzer {
    lookbacks: Vec<usize>,
}

impl TimeframeAnalyzer {
    pub fn new(lookbacks: Vec<usize>) -> Self {
        Self { lookbacks }
    }

    pub fn lookbacks(&self) -> &[usize] {
        &self.lookbacks
    }

    /// One entry per lookback, in configuration order. A lookback longer
    /// than `window` reports NEUTRAL with no price change; indicators that
    /// need more history than the lookback simply do not vote.
    pub fn evaluate(
        &self,
        engine: &IndicatorEngine,
        aggregator: &SignalAggregator,
        window: &[PriceBar],
    ) -> Vec<TimeframeSignal> {
        self.lookbacks
            .iter()
            .map(|&lookback| {
                let neutral = TimeframeSignal {
                    lookback,
                    direction: SignalDirection::Neutral,
                    strength: 0.0,
                    price_change: 0.0,
                };
                if lookback == 0 || window.len() < lookback {
                    return neutral;
                }
                let recent = &window[window.len() - lookback..];
                let signal: Option<Signal> = engine
                    .compute(recent)
                    .and_then(|snapshot| aggregator.aggregate(&snapshot).ok());
                match signal {
                    Some(signal) => TimeframeSignal {
                        lookback,
                        direction: signal.direction,
                        strength: signal.strength,
                        price_change: price_change_pct(recent),
                    },
                    None => neutral,
                }
            })
            .collect()
    }
}

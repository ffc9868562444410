//! Majority-vote aggregation of indicator votes into a [`Signal`].

use crate::error::ConfigError;
use crate::models::{IndicatorSnapshot, Signal, SignalDirection};
use crate::signals::votes::{SignalThresholds, Vote};
use std::collections::BTreeSet;

/// Turns one snapshot into one signal. Pure and side-effect free.
#[derive(Debug, Clone, Default)]
pub struct SignalAggregator {
    thresholds: SignalThresholds,
}

impl SignalAggregator {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SignalThresholds {
        &self.thresholds
    }

    /// Majority direction among voting indicators; ties are NEUTRAL.
    ///
    /// `strength` is the winning vote count over the number of indicators
    /// with a value, so it is always in `[0, 1]` and is 0 for NEUTRAL.
    pub fn aggregate(&self, snapshot: &IndicatorSnapshot) -> Result<Signal, ConfigError> {
        if snapshot.pair_id.trim().is_empty() {
            return Err(ConfigError::MalformedSnapshot(format!(
                "snapshot at {} has no pair_id",
                snapshot.timestamp
            )));
        }
        if !snapshot.close.is_finite() {
            return Err(ConfigError::MalformedSnapshot(format!(
                "snapshot for {} has non-finite close",
                snapshot.pair_id
            )));
        }

        let votes = self.thresholds.votes(snapshot);
        let with_value = votes.len();
        let buys = votes.iter().filter(|v| v.vote == Some(Vote::Buy)).count();
        let sells = votes.iter().filter(|v| v.vote == Some(Vote::Sell)).count();

        let (direction, winner, winning) = if buys > sells {
            (SignalDirection::Buy, Vote::Buy, buys)
        } else if sells > buys {
            (SignalDirection::Sell, Vote::Sell, sells)
        } else {
            return Ok(Signal::neutral(
                snapshot.pair_id.clone(),
                snapshot.timestamp,
                snapshot.close,
            ));
        };

        let triggering_indicators: BTreeSet<_> = votes
            .iter()
            .filter(|v| v.vote == Some(winner))
            .map(|v| v.indicator)
            .collect();

        Ok(Signal {
            pair_id: snapshot.pair_id.clone(),
            timestamp: snapshot.timestamp,
            direction,
            strength: winning as f64 / with_value as f64,
            triggering_indicators,
            price: snapshot.close,
            price_change: 0.0,
            timeframes: Vec::new(),
        })
    }
}

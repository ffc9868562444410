//! Deterministic bar generator for sandbox runs.

use crate::error::FeedError;
use crate::feed::DataFeed;
use crate::models::PriceBar;
use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};

/// Produces one bar per `bar_interval` for any pair, following a smooth
/// oscillation around a per-pair base price. The same pair and timestamp
/// always yield the same bar.
pub struct SyntheticFeed {
    bar_interval: Duration,
    history: usize,
}

impl SyntheticFeed {
    pub fn new(bar_interval: Duration, history: usize) -> Self {
        Self {
            bar_interval,
            history: history.max(1),
        }
    }

    fn base_price(pair_id: &str) -> f64 {
        let hash = pair_id
            .bytes()
            .fold(17u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        0.5 + (hash % 2000) as f64 / 10.0
    }

    fn bar_at(&self, pair_id: &str, timestamp: DateTime<Utc>) -> PriceBar {
        let base = Self::base_price(pair_id);
        let step = timestamp.timestamp() as f64 / self.bar_interval.num_seconds().max(1) as f64;
        let phase = base * 7.0;
        let wave = (step / 9.0 + phase).sin() * 0.012 + (step / 31.0 + phase).cos() * 0.02;
        let close = base * (1.0 + wave);
        let open = base * (1.0 + wave - 0.001 * (step + phase).sin());
        let (high, low) = (close.max(open) * 1.0005, close.min(open) * 0.9995);
        PriceBar::new(pair_id, timestamp, open, high, low, close)
    }
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self::new(Duration::minutes(1), 200)
    }
}

#[async_trait]
impl DataFeed for SyntheticFeed {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch(
        &self,
        pair_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PriceBar>, FeedError> {
        let latest = Utc::now()
            .duration_trunc(self.bar_interval)
            .map_err(|e| FeedError::Malformed {
                pair_id: pair_id.to_string(),
                message: e.to_string(),
            })?;

        let bars = (0..self.history as i32)
            .rev()
            .map(|back| latest - self.bar_interval * back)
            .filter(|ts| since.map_or(true, |s| *ts > s))
            .map(|ts| self.bar_at(pair_id, ts))
            .collect();
        Ok(bars)
    }
}

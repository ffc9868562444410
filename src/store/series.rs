use crate::error::{DataError, InsufficientData};
use crate::models::PriceBar;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Bounded, strictly time-ordered buffer of bars for a single pair.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pair_id: String,
    retention: usize,
    bars: VecDeque<PriceBar>,
}

impl PriceSeries {
    pub fn new(pair_id: impl Into<String>, retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            pair_id: pair_id.into(),
            retention,
            bars: VecDeque::with_capacity(retention),
        }
    }

    pub fn pair_id(&self) -> &str {
        &self.pair_id
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.back().map(|b| b.timestamp)
    }

    /// Append a bar. Bars not strictly newer than the last one are rejected;
    /// the oldest bar is evicted once the buffer is over retention.
    pub fn append(&mut self, bar: PriceBar) -> Result<(), DataError> {
        if bar.pair_id != self.pair_id {
            return Err(DataError::WrongPair {
                expected: self.pair_id.clone(),
                got: bar.pair_id,
            });
        }
        if let Some(reason) = bar.validation_error() {
            return Err(DataError::Malformed {
                pair_id: bar.pair_id,
                timestamp: bar.timestamp,
                reason: reason.to_string(),
            });
        }
        if let Some(last) = self.last_timestamp() {
            if bar.timestamp <= last {
                return Err(DataError::OutOfOrder {
                    pair_id: bar.pair_id,
                    timestamp: bar.timestamp,
                    last,
                });
            }
        }

        self.bars.push_back(bar);
        while self.bars.len() > self.retention {
            self.bars.pop_front();
        }
        Ok(())
    }

    /// The last `length` bars, oldest first.
    pub fn window(&mut self, length: usize) -> Result<&[PriceBar], InsufficientData> {
        if self.bars.len() < length {
            return Err(InsufficientData {
                required: length,
                available: self.bars.len(),
            });
        }
        let start = self.bars.len() - length;
        Ok(&self.bars.make_contiguous()[start..])
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn bars(&self) -> impl ExactSizeIterator<Item = &PriceBar> {
        self.bars.iter()
    }
}

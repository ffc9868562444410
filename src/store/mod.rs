//! Rolling per-pair storage of price bars.

pub mod series;

pub use series::PriceSeries;

use crate::error::{DataError, InsufficientData};
use crate::models::PriceBar;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Price series for every configured pair, partitioned by `pair_id`.
///
/// Each pair sits behind its own lock, so cycles for different pairs never
/// contend. Locks are only held for the synchronous append/copy and never
/// across an await point.
pub struct PriceSeriesStore {
    retention: usize,
    partitions: RwLock<HashMap<String, Arc<Mutex<PriceSeries>>>>,
}

impl PriceSeriesStore {
    pub fn new(retention: usize) -> Self {
        Self {
            retention,
            partitions: RwLock::new(HashMap::new()),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Append a bar, creating the pair's series on first use.
    pub fn append(&self, pair_id: &str, bar: PriceBar) -> Result<(), DataError> {
        let partition = self.partition(pair_id);
        let mut series = lock(&partition);
        series.append(bar)
    }

    /// The most recent `length` bars in timestamp order.
    pub fn window(&self, pair_id: &str, length: usize) -> Result<Vec<PriceBar>, InsufficientData> {
        let Some(partition) = self.existing(pair_id) else {
            return Err(InsufficientData {
                required: length,
                available: 0,
            });
        };
        let mut series = lock(&partition);
        let window = series.window(length).map(|bars| bars.to_vec());
        window
    }

    pub fn last_timestamp(&self, pair_id: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        let partition = self.existing(pair_id)?;
        let series = lock(&partition);
        series.last_timestamp()
    }

    pub fn len(&self, pair_id: &str) -> usize {
        match self.existing(pair_id) {
            Some(partition) => {
                let series = lock(&partition);
                series.len()
            }
            None => 0,
        }
    }

    /// Every retained bar for the pair, oldest first.
    pub fn retained(&self, pair_id: &str) -> Vec<PriceBar> {
        match self.existing(pair_id) {
            Some(partition) => {
                let series = lock(&partition);
                let bars: Vec<PriceBar> = series.bars().cloned().collect();
                bars
            }
            None => Vec::new(),
        }
    }

    fn existing(&self, pair_id: &str) -> Option<Arc<Mutex<PriceSeries>>> {
        let partitions = self
            .partitions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        partitions.get(pair_id).cloned()
    }

    fn partition(&self, pair_id: &str) -> Arc<Mutex<PriceSeries>> {
        if let Some(existing) = self.existing(pair_id) {
            return existing;
        }
        let mut partitions = self
            .partitions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        partitions
            .entry(pair_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(PriceSeries::new(pair_id, self.retention))))
            .clone()
    }
}

fn lock(partition: &Mutex<PriceSeries>) -> MutexGuard<'_, PriceSeries> {
    // A series is only mutated by whole-bar pushes, so a poisoned lock still
    // guards a consistent buffer.
    partition
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

//! Data-feed collaborator interface.

pub mod synthetic;

pub use synthetic::SyntheticFeed;

use crate::error::FeedError;
use crate::models::PriceBar;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait DataFeed: Send + Sync {
    /// Name used for per-feed health accounting.
    fn name(&self) -> &str;

    /// Bars for `pair_id` newer than `since` (all available bars when `None`),
    /// oldest first.
    async fn fetch(
        &self,
        pair_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PriceBar>, FeedError>;
}

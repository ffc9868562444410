//! Signal aggregation from indicator snapshots.

pub mod aggregator;
pub mod timeframes;
pub mod votes;

pub use aggregator::SignalAggregator;
pub use timeframes::{price_change_pct, TimeframeAnalyzer};
pub use votes::{IndicatorVote, SignalThresholds, Vote};

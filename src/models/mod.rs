//! Shared data models spanning the pipeline stages.

pub mod bar;
pub mod health;
pub mod indicators;
pub mod signal;

pub use bar::PriceBar;
pub use health::{HealthStatus, PairHealthState};
pub use indicators::{BollingerBands, EmaPair, IndicatorSnapshot, MacdValue};
pub use signal::{IndicatorName, Signal, SignalDirection, TimeframeSignal};

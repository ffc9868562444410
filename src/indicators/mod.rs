//! Technical indicator calculators.
//!
//! Each calculator offers a full recomputation over a window of closes and,
//! where the math carries memory (RSI, EMA, MACD), an incremental state that
//! is advanced one bar at a time and produces the same values.

pub mod engine;
pub mod params;
pub mod state;

pub mod momentum;
pub mod trend;
pub mod volatility;

pub use engine::IndicatorEngine;
pub use params::IndicatorParams;
pub use state::IndicatorState;

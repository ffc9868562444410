//! Bollinger Bands indicator

use crate::common::math;
use crate::error::InsufficientData;
use crate::models::BollingerBands;

/// Bollinger Bands over the last `period` closes.
///
/// Middle = SMA(period), upper/lower = middle ± k * population std-dev.
pub fn calculate_bollinger_bands(
    closes: &[f64],
    period: usize,
    k: f64,
) -> Result<BollingerBands, InsufficientData> {
    let insufficient = InsufficientData {
        required: period,
        available: closes.len(),
    };
    let middle = math::sma(closes, period).ok_or(insufficient)?;
    let std = math::standard_deviation(closes, period).ok_or(insufficient)?;

    Ok(BollingerBands {
        upper: middle + k * std,
        middle,
        lower: middle - k * std,
    })
}

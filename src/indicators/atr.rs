//! Average True Range (ATR) indicator.

use crate::error::{Error, Result};

use super::true_range::true_range;

/// Calculate Average True Range (ATR) with Wilder smoothing.
///
/// The seed at index `period` is the arithmetic mean of the first `period`
/// true ranges (true range itself needs a previous close, so it starts at
/// index 1). Warm-up is `period` entries.
///
/// # Arguments
///
/// * `highs` - High prices
/// * `lows` - Low prices
/// * `closes` - Close prices
/// * `period` - Number of periods (typically 14)
///
/// # Example
///
/// ```
/// use b3_quant::indicators::atr;
///
/// let highs = vec![50.0, 51.0, 52.0, 51.5, 53.0, 54.0, 53.5, 55.0];
/// let lows = vec![48.0, 49.0, 50.0, 49.5, 51.0, 52.0, 51.5, 53.0];
/// let closes = vec![49.0, 50.5, 51.0, 50.0, 52.0, 53.0, 52.5, 54.0];
///
/// let result = atr(&highs, &lows, &closes, 3).unwrap();
/// assert!(result[2].is_none());
/// assert!(result[3].is_some());
/// ```
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(Error::invalid_input("period", "must be greater than 0"));
    }
    if highs.len() <= period {
        return Err(Error::insufficient_data(period + 1, highs.len()));
    }

    let tr = true_range(highs, lows, closes)?;
    let mut result = vec![None; highs.len()];

    // Seed from the first `period` defined true ranges (indices 1..=period)
    let seed: f64 = tr[1..=period].iter().map(|v| v.unwrap()).sum::<f64>() / period as f64;
    result[period] = Some(seed);

    let mut prev = seed;
    for i in (period + 1)..highs.len() {
        prev = (prev * (period - 1) as f64 + tr[i].unwrap()) / period as f64;
        result[i] = Some(prev);
    }

    Ok(result)
}

//! Per-bar true range.

use crate::error::{Error, Result};

/// Calculate the true range for each bar.
///
/// True range is the greatest of `high - low`, `|high - prev_close|` and
/// `|low - prev_close|`. The first bar has no previous close, so index 0
/// is `None`.
///
/// # Arguments
///
/// * `highs` - High prices
/// * `lows` - Low prices
/// * `closes` - Close prices
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Result<Vec<Option<f64>>> {
    let len = highs.len();
    if lows.len() != len || closes.len() != len {
        return Err(Error::invalid_input(
            "columns",
            "high/low/close lengths must match",
        ));
    }

    let mut result = vec![None; len];
    for i in 1..len {
        let h_l = highs[i] - lows[i];
        let h_pc = (highs[i] - closes[i - 1]).abs();
        let l_pc = (lows[i] - closes[i - 1]).abs();
        result[i] = Some(h_l.max(h_pc).max(l_pc));
    }
    Ok(result)
}

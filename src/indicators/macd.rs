//! Moving Average Convergence Divergence (MACD) indicator.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::ema::ema;

/// MACD calculation result containing the MACD line, signal line, and histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdResult {
    /// MACD line (fast EMA - slow EMA), defined from index `slow - 1`
    pub macd_line: Vec<Option<f64>>,
    /// Signal line (EMA of MACD line), defined from index `slow + signal - 2`
    pub signal_line: Vec<Option<f64>>,
    /// Histogram (MACD line - signal line), defined with the signal line
    pub histogram: Vec<Option<f64>>,
}

/// Calculate Moving Average Convergence Divergence (MACD).
///
/// Standard parameters are (12, 26, 9). The overall warm-up is
/// `slow + signal - 2` entries: the MACD line appears at index `slow - 1`
/// and the signal line `signal - 1` bars later.
///
/// # Arguments
///
/// * `data` - Price data (typically close prices)
/// * `fast_period` - Fast EMA period (typically 12)
/// * `slow_period` - Slow EMA period (typically 26)
/// * `signal_period` - Signal line EMA period (typically 9)
///
/// # Example
///
/// ```
/// use b3_quant::indicators::macd;
///
/// let prices: Vec<f64> = (1..=50).map(|x| x as f64).collect();
/// let result = macd(&prices, 12, 26, 9).unwrap();
///
/// assert_eq!(result.macd_line.len(), prices.len());
/// assert!(result.macd_line[25].is_some());
/// assert!(result.signal_line[32].is_none());
/// assert!(result.signal_line[33].is_some()); // 26 + 9 - 2
/// ```
pub fn macd(
    data: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Result<MacdResult> {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 {
        return Err(Error::invalid_input("period", "all periods must be greater than 0"));
    }
    if fast_period >= slow_period {
        return Err(Error::invalid_input(
            "fast_period",
            "must be less than slow_period",
        ));
    }
    let min_len = slow_period + signal_period - 1;
    if data.len() < min_len {
        return Err(Error::insufficient_data(min_len, data.len()));
    }

    let fast_ema = ema(data, fast_period);
    let slow_ema = ema(data, slow_period);

    let macd_line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // Signal line is the EMA of the defined MACD values, mapped back to the
    // full-length vector.
    let macd_values: Vec<f64> = macd_line.iter().filter_map(|&v| v).collect();
    let signal_ema = ema(&macd_values, signal_period);

    let mut signal_line = vec![None; data.len()];
    let mut compact_idx = 0;
    for (i, value) in macd_line.iter().enumerate() {
        if value.is_some() {
            signal_line[i] = signal_ema.get(compact_idx).copied().flatten();
            compact_idx += 1;
        }
    }

    let histogram: Vec<Option<f64>> = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    Ok(MacdResult {
        macd_line,
        signal_line,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_warmups() {
        let data: Vec<f64> = (1..=50).map(|x| x as f64).collect();
        let result = macd(&data, 12, 26, 9).unwrap();

        assert_eq!(result.macd_line.len(), 50);
        assert!(result.macd_line[24].is_none());
        assert!(result.macd_line[25].is_some());
        assert!(result.signal_line[32].is_none());
        assert!(result.signal_line[33].is_some());
        assert!(result.histogram[33].is_some());
    }

    #[test]
    fn test_macd_histogram_is_difference() {
        let data: Vec<f64> = (1..=60).map(|x| 100.0 + (x as f64 * 0.3).sin()).collect();
        let result = macd(&data, 12, 26, 9).unwrap();
        for i in 0..data.len() {
            if let (Some(m), Some(s), Some(h)) =
                (result.macd_line[i], result.signal_line[i], result.histogram[i])
            {
                assert!((h - (m - s)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_macd_invalid_periods() {
        let data: Vec<f64> = (1..=50).map(|x| x as f64).collect();
        assert!(macd(&data, 26, 12, 9).is_err());
        assert!(macd(&data, 0, 26, 9).is_err());
    }

    #[test]
    fn test_macd_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(macd(&data, 12, 26, 9).is_err());
    }
}

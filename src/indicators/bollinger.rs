//! Bollinger Bands indicator.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::sma::sma;

/// Bollinger Bands result containing upper, middle, and lower bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    /// Upper band (SMA + multiplier * stddev)
    pub upper: Vec<Option<f64>>,
    /// Middle band (SMA)
    pub middle: Vec<Option<f64>>,
    /// Lower band (SMA - multiplier * stddev)
    pub lower: Vec<Option<f64>>,
}

/// Calculate Bollinger Bands.
///
/// Middle band is the SMA over `period`; upper and lower bands sit
/// `std_dev_multiplier` population standard deviations away. Warm-up is
/// `period - 1` entries.
///
/// # Arguments
///
/// * `data` - Price data (typically close prices)
/// * `period` - Number of periods for the SMA (typically 20)
/// * `std_dev_multiplier` - Number of standard deviations (typically 2.0)
///
/// # Example
///
/// ```
/// use b3_quant::indicators::bollinger_bands;
///
/// let prices: Vec<f64> = (1..=30).map(|x| x as f64 + (x % 3) as f64).collect();
/// let result = bollinger_bands(&prices, 20, 2.0).unwrap();
///
/// assert!(result.middle[18].is_none());
/// assert!(result.middle[19].is_some());
/// ```
pub fn bollinger_bands(
    data: &[f64],
    period: usize,
    std_dev_multiplier: f64,
) -> Result<BollingerBands> {
    if period == 0 {
        return Err(Error::invalid_input("period", "must be greater than 0"));
    }
    if data.len() < period {
        return Err(Error::insufficient_data(period, data.len()));
    }

    let middle = sma(data, period);
    let mut upper = vec![None; data.len()];
    let mut lower = vec![None; data.len()];

    for i in (period - 1)..data.len() {
        let window = &data[i + 1 - period..=i];
        let mean = middle[i].unwrap();
        let variance = window.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std_dev = variance.sqrt();
        upper[i] = Some(mean + std_dev_multiplier * std_dev);
        lower[i] = Some(mean - std_dev_multiplier * std_dev);
    }

    Ok(BollingerBands {
        upper,
        middle,
        lower,
    })
}

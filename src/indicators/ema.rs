//! Exponential Moving Average (EMA) indicator.

use super::sma::sma;

/// Calculate Exponential Moving Average (EMA).
///
/// The seed at index `period - 1` is the simple average of the first
/// `period` values; afterwards `ema = value * alpha + prev * (1 - alpha)`
/// with `alpha = 2 / (period + 1)`. Warm-up is `period - 1` entries.
///
/// # Arguments
///
/// * `data` - Price data (typically close prices)
/// * `period` - Number of periods for the moving average
///
/// # Example
///
/// ```
/// use b3_quant::indicators::ema;
///
/// let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0];
/// let result = ema(&prices, 3);
///
/// assert!(result[1].is_none());
/// assert_eq!(result[2], Some(11.0)); // seed = SMA of first 3
/// assert!(result[3].is_some());
/// ```
pub fn ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || data.len() < period {
        return vec![None; data.len()];
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut result = vec![None; data.len()];

    // Seed with the SMA of the first `period` values
    let seed = sma(&data[..period], period)[period - 1].unwrap();
    result[period - 1] = Some(seed);

    let mut prev = seed;
    for i in period..data.len() {
        prev = data[i] * alpha + prev * (1.0 - alpha);
        result[i] = Some(prev);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seed_is_sma() {
        let data = vec![2.0, 4.0, 6.0, 8.0];
        let result = ema(&data, 3);
        assert_eq!(result[2], Some(4.0));
    }

    #[test]
    fn test_ema_recursion() {
        let data = vec![2.0, 4.0, 6.0, 8.0];
        let result = ema(&data, 3);
        // alpha = 0.5: 8 * 0.5 + 4 * 0.5 = 6
        assert_eq!(result[3], Some(6.0));
    }

    #[test]
    fn test_ema_period_1_tracks_price() {
        let data = vec![10.0, 20.0, 30.0];
        let result = ema(&data, 1);
        assert_eq!(result, vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn test_ema_insufficient_data() {
        let data = vec![1.0, 2.0];
        assert_eq!(ema(&data, 5), vec![None, None]);
    }

    #[test]
    fn test_ema_deterministic() {
        let data: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64).sin()).collect();
        assert_eq!(ema(&data, 9), ema(&data, 9));
    }
}

//! Average Directional Index (ADX) indicator with DI+ and DI-.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::true_range::true_range;

/// ADX calculation result with the directional indicator lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdxResult {
    /// Trend strength in `[0, 100]`, defined from index `2 * period`
    pub adx: Vec<Option<f64>>,
    /// Positive directional indicator, defined from index `period`
    pub plus_di: Vec<Option<f64>>,
    /// Negative directional indicator, defined from index `period`
    pub minus_di: Vec<Option<f64>>,
}

/// Calculate Average Directional Index (ADX) with Wilder smoothing.
///
/// Measures trend strength regardless of direction. DI+/DI- become defined
/// at index `period`; the ADX line averages `period` DX values on top of
/// that, so its warm-up is `2 * period` entries. Bars with zero smoothed
/// true range produce `None` (never infinity).
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
/// use b3_quant::indicators::adx;
///
/// let highs: Vec<f64> = (0..35).map(|i| 100.0 + i as f64).collect();
/// let lows: Vec<f64> = highs.iter().map(|h| h - 2.0).collect();
/// let closes: Vec<f64> = highs.iter().map(|h| h - 1.0).collect();
///
/// let result = adx(&highs, &lows, &closes, 14).unwrap();
/// assert!(result.adx[27].is_none());
/// assert!(result.adx[28].is_some()); // 2 * 14
/// ```
pub fn adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Result<AdxResult> {
    if period == 0 {
        return Err(Error::invalid_input("period", "must be greater than 0"));
    }
    let len = highs.len();
    if lows.len() != len || closes.len() != len {
        return Err(Error::invalid_input(
            "columns",
            "high/low/close lengths must match",
        ));
    }
    if len <= 2 * period {
        return Err(Error::insufficient_data(2 * period + 1, len));
    }

    let tr = true_range(highs, lows, closes)?;

    // Directional movement, defined from index 1
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];
    for i in 1..len {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }

    let mut plus_di = vec![None; len];
    let mut minus_di = vec![None; len];
    let mut dx = vec![None; len];

    // Wilder-smoothed TR and DM, seeded with the mean of indices 1..=period
    let mut sm_tr: f64 = tr[1..=period].iter().map(|v| v.unwrap()).sum::<f64>() / period as f64;
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum::<f64>() / period as f64;
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum::<f64>() / period as f64;

    for i in period..len {
        if i > period {
            sm_tr = (sm_tr * (period - 1) as f64 + tr[i].unwrap()) / period as f64;
            sm_plus = (sm_plus * (period - 1) as f64 + plus_dm[i]) / period as f64;
            sm_minus = (sm_minus * (period - 1) as f64 + minus_dm[i]) / period as f64;
        }

        if sm_tr > 0.0 {
            let p_di = 100.0 * sm_plus / sm_tr;
            let m_di = 100.0 * sm_minus / sm_tr;
            plus_di[i] = Some(p_di);
            minus_di[i] = Some(m_di);
            let di_sum = p_di + m_di;
            if di_sum > 0.0 {
                dx[i] = Some(100.0 * (p_di - m_di).abs() / di_sum);
            }
        }
    }

    // ADX seed at index 2*period averages the DX values that follow the
    // smoothing seed (indices period+1 ..= 2*period).
    let mut result = vec![None; len];
    let first_idx = 2 * period;
    let seed_window = &dx[period + 1..=first_idx];
    if seed_window.iter().all(|v| v.is_some()) {
        let mut adx_val =
            seed_window.iter().map(|v| v.unwrap()).sum::<f64>() / period as f64;
        result[first_idx] = Some(adx_val);

        for i in (first_idx + 1)..len {
            match dx[i] {
                Some(dx_val) => {
                    adx_val = (adx_val * (period - 1) as f64 + dx_val) / period as f64;
                    result[i] = Some(adx_val);
                }
                None => break,
            }
        }
    }

    Ok(AdxResult {
        adx: result,
        plus_di,
        minus_di,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adx_warmups() {
        let highs: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 + (i % 3) as f64).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 2.0).collect();
        let closes: Vec<f64> = highs.iter().map(|h| h - 1.0).collect();

        let result = adx(&highs, &lows, &closes, 14).unwrap();
        assert!(result.plus_di[13].is_none());
        assert!(result.plus_di[14].is_some());
        assert!(result.adx[27].is_none());
        assert!(result.adx[28].is_some());
    }

    #[test]
    fn test_adx_strong_uptrend_reads_high() {
        let highs: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 1.0).collect();
        let closes: Vec<f64> = highs.iter().map(|h| h - 0.5).collect();

        let result = adx(&highs, &lows, &closes, 14).unwrap();
        let last = result.adx[59].unwrap();
        assert!(last > 60.0, "monotone trend should read strong, got {last}");
        // All directional movement is upward
        assert!(result.plus_di[59].unwrap() > result.minus_di[59].unwrap());
    }

    #[test]
    fn test_adx_zero_range_is_undefined() {
        // Identical bars: true range is zero, so DI and ADX stay undefined
        let highs = vec![100.0; 40];
        let lows = vec![100.0; 40];
        let closes = vec![100.0; 40];

        let result = adx(&highs, &lows, &closes, 14).unwrap();
        assert!(result.plus_di.iter().all(|v| v.is_none()));
        assert!(result.adx.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_adx_insufficient_data() {
        let highs = vec![10.0; 28];
        let lows = vec![8.0; 28];
        let closes = vec![9.0; 28];
        assert!(adx(&highs, &lows, &closes, 14).is_err());
    }
}

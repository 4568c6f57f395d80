//! Relative Strength Index (RSI) indicator.

use crate::error::{Error, Result};

/// Calculate Relative Strength Index (RSI) with Wilder smoothing.
///
/// Values lie in `[0, 100]`; readings above 70 are conventionally treated
/// as overbought and below 30 as oversold. Warm-up is `period` entries: the
/// first defined value sits at index `period`.
///
/// # Arguments
///
/// * `data` - Price data (typically close prices)
/// * `period` - Number of periods (typically 14)
///
/// # Formula
///
/// 1. Per-bar change `c_i = data[i] - data[i-1]`, split into gains and losses
/// 2. Seed averages = arithmetic mean of the first `period` gains/losses
/// 3. Wilder recursion: `avg = (prev * (period - 1) + value) / period`
/// 4. `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`
///
/// A zero average loss makes the relative-strength quotient a division by
/// zero, which surfaces as `None` like every other undefined value. Callers
/// treating "no losses in the window" as maximally overbought must handle
/// that case explicitly.
///
/// # Example
///
/// ```
/// use b3_quant::indicators::rsi;
///
/// let prices = vec![
///     44.0, 44.3, 44.1, 43.6, 44.3, 44.8, 45.1, 45.4,
///     45.8, 46.1, 45.9, 46.0, 45.6, 46.3, 46.3, 46.0,
/// ];
/// let result = rsi(&prices, 14).unwrap();
///
/// assert!(result[13].is_none());
/// assert!(result[14].is_some());
/// ```
pub fn rsi(data: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(Error::invalid_input("period", "must be greater than 0"));
    }
    if data.len() <= period {
        return Err(Error::insufficient_data(period + 1, data.len()));
    }

    let mut result = vec![None; data.len()];

    // Change at bar i lives at gains[i - 1]
    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = rsi_value(avg_gain, avg_loss);

    for i in (period + 1)..data.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i - 1]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i - 1]) / period as f64;
        result[i] = rsi_value(avg_gain, avg_loss);
    }

    Ok(result)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        // Division by zero in the RS quotient: undefined, never infinity
        None
    } else {
        Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
    }
}

//! RSI divergence strategy: price/RSI pivot disagreement with trend and
//! volume confirmation.

use crate::error::Result;
use crate::indicators::{adx, rsi, sma};
use crate::series::BarSeries;
use crate::signal::{Signal, SignalSeries};

use super::{
    ParamDomain, ParamValue, Params, SearchSpace, Strategy, float_param, params_from,
    period_param,
};

/// ADX period used for the trend-strength confirmation filter.
const ADX_PERIOD: usize = 14;

/// Bars on each side a pivot must dominate before it counts.
const PIVOT_SPAN: usize = 2;

/// Detects the four classic price/RSI divergence patterns on confirmed
/// pivots inside a lookback window:
///
/// - regular bullish (price lower low, RSI higher low) and hidden bullish
///   (price higher low, RSI lower low) enter long;
/// - regular bearish (price higher high, RSI lower high) and hidden bearish
///   (price lower high, RSI higher high) exit.
///
/// A pattern only fires on the bar that confirms its latest pivot, and only
/// when ADX exceeds `adx_min` and volume runs above `volume_mult` times its
/// lookback average.
#[derive(Debug, Clone, Default)]
pub struct RsiDivergence;

impl Strategy for RsiDivergence {
    fn name(&self) -> &str {
        "RSIDivergence"
    }

    fn default_params(&self) -> Params {
        params_from(&[
            ("rsi_period", ParamValue::Int(14)),
            ("lookback", ParamValue::Int(20)),
            ("adx_min", ParamValue::Float(20.0)),
            ("volume_mult", ParamValue::Float(1.2)),
        ])
    }

    fn search_space(&self) -> SearchSpace {
        vec![
            ("rsi_period".into(), ParamDomain::IntRange { lo: 7, hi: 21 }),
            ("lookback".into(), ParamDomain::IntRange { lo: 10, hi: 40 }),
            (
                "adx_min".into(),
                ParamDomain::FloatRange { lo: 10.0, hi: 40.0, step: Some(5.0) },
            ),
            (
                "volume_mult".into(),
                ParamDomain::FloatRange { lo: 1.0, hi: 2.0, step: Some(0.1) },
            ),
        ]
    }

    fn warm_up(&self, params: &Params) -> usize {
        let rsi_period = period_param(params, "rsi_period").unwrap_or(14);
        let lookback = period_param(params, "lookback").unwrap_or(20);
        (2 * ADX_PERIOD).max(rsi_period).max(lookback)
    }

    fn compute(&self, bars: &BarSeries, params: &Params) -> Result<SignalSeries> {
        self.validate(params)?;
        let rsi_period = period_param(params, "rsi_period")?;
        let lookback = period_param(params, "lookback")?;
        let adx_min = float_param(params, "adx_min")?;
        let volume_mult = float_param(params, "volume_mult")?;

        let warm_up = self.warm_up(params);
        let n = bars.len();
        if n <= warm_up {
            return Ok(SignalSeries::all_hold(n));
        }

        let closes = bars.closes();
        let highs = bars.highs();
        let lows = bars.lows();
        let volumes = bars.volumes();

        let rsi_series = rsi(&closes, rsi_period)?;
        let adx_result = adx(&highs, &lows, &closes, ADX_PERIOD)?;
        let vol_sma = sma(&volumes, lookback);

        let pivot_lows = pivot_indices(&lows, PIVOT_SPAN, true);
        let pivot_highs = pivot_indices(&highs, PIVOT_SPAN, false);

        let mut signals = Vec::with_capacity(n);
        for i in 0..n {
            if i < warm_up {
                signals.push(Signal::hold(i, closes[i]));
                continue;
            }

            let confirmed = adx_result.adx[i].is_some_and(|a| a > adx_min)
                && vol_sma[i - 1].is_some_and(|v| volumes[i] >= volume_mult * v);
            if !confirmed {
                signals.push(Signal::hold(i, closes[i]));
                continue;
            }

            let signal = if let Some((prev, cur)) =
                confirmed_pivot_pair(&pivot_lows, i, lookback)
                && let (Some(rsi_prev), Some(rsi_cur)) = (rsi_series[prev], rsi_series[cur])
            {
                let regular = lows[cur] < lows[prev] && rsi_cur > rsi_prev;
                let hidden = lows[cur] > lows[prev] && rsi_cur < rsi_prev;
                if regular {
                    Signal::enter_long(i, closes[i]).with_strength(0.9)
                } else if hidden {
                    Signal::enter_long(i, closes[i]).with_strength(0.7)
                } else {
                    Signal::hold(i, closes[i])
                }
            } else if let Some((prev, cur)) = confirmed_pivot_pair(&pivot_highs, i, lookback)
                && let (Some(rsi_prev), Some(rsi_cur)) = (rsi_series[prev], rsi_series[cur])
            {
                let regular = highs[cur] > highs[prev] && rsi_cur < rsi_prev;
                let hidden = highs[cur] < highs[prev] && rsi_cur > rsi_prev;
                if regular || hidden {
                    Signal::exit(i, closes[i])
                } else {
                    Signal::hold(i, closes[i])
                }
            } else {
                Signal::hold(i, closes[i])
            };
            signals.push(signal);
        }

        SignalSeries::new(signals, warm_up)
    }
}

/// Indices whose value strictly dominates a symmetric `span` neighbourhood.
/// `minima` selects pivot lows; otherwise pivot highs.
fn pivot_indices(values: &[f64], span: usize, minima: bool) -> Vec<usize> {
    let n = values.len();
    let mut pivots = Vec::new();
    for j in span..n.saturating_sub(span) {
        let dominates = (j - span..=j + span).all(|k| {
            k == j
                || if minima {
                    values[j] < values[k]
                } else {
                    values[j] > values[k]
                }
        });
        if dominates {
            pivots.push(j);
        }
    }
    pivots
}

/// The two most recent pivots whose latest member is confirmed exactly at
/// bar `i` (pivot + span == i), with the pair no further apart than
/// `lookback` bars. Firing only on the confirmation bar keeps each pivot
/// pair to a single signal.
fn confirmed_pivot_pair(pivots: &[usize], i: usize, lookback: usize) -> Option<(usize, usize)> {
    let pos = pivots.iter().rposition(|&j| j + PIVOT_SPAN == i)?;
    if pos == 0 {
        return None;
    }
    let cur = pivots[pos];
    let prev = pivots[pos - 1];
    (cur - prev <= lookback).then_some((prev, cur))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{Bar, Timeframe};
    use crate::signal::SignalAction;
    use chrono::{TimeZone, Utc};

    fn series_from(rows: &[(f64, f64, f64, f64)]) -> BarSeries {
        // (high, low, close, volume)
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(h, l, c, v))| {
                Bar::new(
                    Utc.timestamp_opt(1_600_000_000 + i as i64 * 86_400, 0).unwrap(),
                    c,
                    h,
                    l,
                    c,
                    v,
                )
            })
            .collect();
        BarSeries::new("TEST", Timeframe::D1, bars).unwrap()
    }

    #[test]
    fn test_pivot_detection() {
        let values = vec![5.0, 4.0, 3.0, 4.0, 5.0, 6.0, 5.5, 4.5, 5.0, 6.0];
        assert_eq!(pivot_indices(&values, 2, true), vec![2, 7]);
        assert_eq!(pivot_indices(&values, 2, false), vec![5]);
    }

    #[test]
    fn test_pivot_pair_requires_confirmation_bar() {
        let pivots = vec![4, 11];
        // Bar 13 confirms pivot 11 (span 2)
        assert_eq!(confirmed_pivot_pair(&pivots, 13, 20), Some((4, 11)));
        // Any other bar does not fire
        assert_eq!(confirmed_pivot_pair(&pivots, 14, 20), None);
        // Too far apart
        assert_eq!(confirmed_pivot_pair(&pivots, 13, 5), None);
    }

    #[test]
    fn test_regular_bullish_divergence_enters() {
        // Downtrend with two pivot lows: price makes a lower low while the
        // second decline is much shallower per-bar, which lifts RSI.
        let mut rows: Vec<(f64, f64, f64, f64)> = Vec::new();
        let mut price = 200.0;
        // Steep decline into the first pivot low
        for _ in 0..35 {
            price -= 3.0;
            rows.push((price + 1.0, price - 1.0, price, 1_000.0));
        }
        // Sharp bounce
        for _ in 0..6 {
            price += 2.0;
            rows.push((price + 1.0, price - 1.0, price, 1_000.0));
        }
        // Slow drift to a marginal lower low
        for _ in 0..14 {
            price -= 1.0;
            rows.push((price + 1.0, price - 1.0, price, 1_000.0));
        }
        // Recovery bars confirm the second pivot, with a volume surge
        for _ in 0..4 {
            price += 2.0;
            rows.push((price + 1.0, price - 1.0, price, 2_500.0));
        }

        let series = series_from(&rows);
        let strategy = RsiDivergence;
        let signals = strategy.compute(&series, &strategy.default_params()).unwrap();
        let entries: Vec<_> = signals
            .signals()
            .iter()
            .filter(|s| s.action == SignalAction::EnterLong)
            .collect();
        assert!(
            !entries.is_empty(),
            "lower low with rising RSI should fire a bullish divergence"
        );
    }

    #[test]
    fn test_quiet_volume_suppresses_signal() {
        let mut rows: Vec<(f64, f64, f64, f64)> = Vec::new();
        let mut price = 200.0;
        for _ in 0..35 {
            price -= 3.0;
            rows.push((price + 1.0, price - 1.0, price, 1_000.0));
        }
        for _ in 0..6 {
            price += 2.0;
            rows.push((price + 1.0, price - 1.0, price, 1_000.0));
        }
        for _ in 0..14 {
            price -= 1.0;
            rows.push((price + 1.0, price - 1.0, price, 1_000.0));
        }
        // Confirmation bars carry no volume expansion
        for _ in 0..4 {
            price += 2.0;
            rows.push((price + 1.0, price - 1.0, price, 1_000.0));
        }

        let series = series_from(&rows);
        let strategy = RsiDivergence;
        let signals = strategy.compute(&series, &strategy.default_params()).unwrap();
        assert!(
            !signals.signals().iter().any(Signal::is_entry),
            "flat volume must fail the confirmation filter"
        );
    }
}

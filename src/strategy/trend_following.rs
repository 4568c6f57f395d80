//! Trend-following strategy: EMA crossover gated by RSI.

use crate::error::{Error, Result};
use crate::indicators::{ema, rsi};
use crate::series::BarSeries;
use crate::signal::{Signal, SignalSeries};

use super::{
    ParamDomain, ParamValue, Params, SearchSpace, Strategy, crossed_above, crossed_below,
    float_param, params_from, period_param,
};

/// EMA crossover entries filtered by RSI.
///
/// Enters long on the bar where the fast EMA crosses above the slow EMA
/// while RSI is not overbought; exits on the reverse crossover or once RSI
/// moves above the overbought threshold. When the trend is already
/// established at the first bar past warm-up (the crossover happened inside
/// the warm-up prefix), the entry fires there. An undefined RSI (no losses
/// in the window) does not veto an entry.
#[derive(Debug, Clone, Default)]
pub struct TrendFollowing;

impl Strategy for TrendFollowing {
    fn name(&self) -> &str {
        "TrendFollowing"
    }

    fn default_params(&self) -> Params {
        params_from(&[
            ("ema_fast", ParamValue::Int(9)),
            ("ema_slow", ParamValue::Int(21)),
            ("rsi_period", ParamValue::Int(14)),
            ("rsi_overbought", ParamValue::Float(70.0)),
            ("rsi_oversold", ParamValue::Float(30.0)),
        ])
    }

    fn search_space(&self) -> SearchSpace {
        vec![
            ("ema_fast".into(), ParamDomain::IntRange { lo: 5, hi: 20 }),
            ("ema_slow".into(), ParamDomain::IntRange { lo: 15, hi: 60 }),
            ("rsi_period".into(), ParamDomain::IntRange { lo: 7, hi: 21 }),
            (
                "rsi_overbought".into(),
                ParamDomain::FloatRange { lo: 60.0, hi: 85.0, step: Some(5.0) },
            ),
            (
                "rsi_oversold".into(),
                ParamDomain::FloatRange { lo: 15.0, hi: 40.0, step: Some(5.0) },
            ),
        ]
    }

    fn validate(&self, params: &Params) -> Result<()> {
        super::validate_against_space(&self.search_space(), params)?;
        let fast = period_param(params, "ema_fast")?;
        let slow = period_param(params, "ema_slow")?;
        if slow <= fast {
            return Err(Error::invalid_input(
                "ema_slow",
                format!("must exceed ema_fast ({slow} <= {fast})"),
            ));
        }
        Ok(())
    }

    fn warm_up(&self, params: &Params) -> usize {
        let slow = period_param(params, "ema_slow").unwrap_or(21);
        let rsi_period = period_param(params, "rsi_period").unwrap_or(14);
        slow.max(rsi_period)
    }

    fn compute(&self, bars: &BarSeries, params: &Params) -> Result<SignalSeries> {
        self.validate(params)?;
        let fast_period = period_param(params, "ema_fast")?;
        let slow_period = period_param(params, "ema_slow")?;
        let rsi_period = period_param(params, "rsi_period")?;
        let overbought = float_param(params, "rsi_overbought")?;

        let warm_up = self.warm_up(params);
        let n = bars.len();
        if n <= warm_up {
            return Ok(SignalSeries::all_hold(n));
        }

        let closes = bars.closes();
        let fast = ema(&closes, fast_period);
        let slow = ema(&closes, slow_period);
        let rsi_series = rsi(&closes, rsi_period)?;

        let mut signals = Vec::with_capacity(n);
        for i in 0..n {
            if i < warm_up {
                signals.push(Signal::hold(i, closes[i]));
                continue;
            }
            let rsi_val = rsi_series[i];
            let not_overbought = !rsi_val.is_some_and(|r| r >= overbought);

            // A crossover completed inside the warm-up prefix surfaces as an
            // already-established trend on the first usable bar.
            let trend_begins = crossed_above(&fast, &slow, i)
                || (i == warm_up
                    && matches!((fast[i], slow[i]), (Some(f), Some(s)) if f > s));

            let signal = if trend_begins && not_overbought {
                Signal::enter_long(i, closes[i])
            } else if crossed_below(&fast, &slow, i)
                || rsi_val.is_some_and(|r| r > overbought)
            {
                Signal::exit(i, closes[i])
            } else {
                Signal::hold(i, closes[i])
            };
            signals.push(signal);
        }

        SignalSeries::new(signals, warm_up)
    }
}

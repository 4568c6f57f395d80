//! Mean-reversion strategy: Bollinger lower band plus RSI oversold.

use crate::error::Result;
use crate::indicators::{bollinger_bands, rsi};
use crate::series::BarSeries;
use crate::signal::{Signal, SignalSeries};

use super::{
    ParamDomain, ParamValue, Params, SearchSpace, Strategy, float_param, params_from,
    period_param,
};

/// Buys weakness below the lower Bollinger band when RSI confirms oversold;
/// exits once price reclaims the middle band or RSI reaches overbought.
#[derive(Debug, Clone, Default)]
pub struct MeanReversion;

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        "MeanReversion"
    }

    fn default_params(&self) -> Params {
        params_from(&[
            ("bb_period", ParamValue::Int(20)),
            ("bb_std", ParamValue::Float(2.0)),
            ("rsi_period", ParamValue::Int(14)),
            ("rsi_oversold", ParamValue::Float(30.0)),
            ("rsi_overbought", ParamValue::Float(70.0)),
        ])
    }

    fn search_space(&self) -> SearchSpace {
        vec![
            ("bb_period".into(), ParamDomain::IntRange { lo: 10, hi: 40 }),
            (
                "bb_std".into(),
                ParamDomain::FloatRange { lo: 1.0, hi: 3.0, step: Some(0.25) },
            ),
            ("rsi_period".into(), ParamDomain::IntRange { lo: 7, hi: 21 }),
            (
                "rsi_oversold".into(),
                ParamDomain::FloatRange { lo: 15.0, hi: 40.0, step: Some(5.0) },
            ),
            (
                "rsi_overbought".into(),
                ParamDomain::FloatRange { lo: 60.0, hi: 85.0, step: Some(5.0) },
            ),
        ]
    }

    fn warm_up(&self, params: &Params) -> usize {
        let bb = period_param(params, "bb_period").unwrap_or(20);
        let rsi_period = period_param(params, "rsi_period").unwrap_or(14);
        (bb - 1).max(rsi_period)
    }

    fn compute(&self, bars: &BarSeries, params: &Params) -> Result<SignalSeries> {
        self.validate(params)?;
        let bb_period = period_param(params, "bb_period")?;
        let bb_std = float_param(params, "bb_std")?;
        let rsi_period = period_param(params, "rsi_period")?;
        let oversold = float_param(params, "rsi_oversold")?;
        let overbought = float_param(params, "rsi_overbought")?;

        let warm_up = self.warm_up(params);
        let n = bars.len();
        if n <= warm_up {
            return Ok(SignalSeries::all_hold(n));
        }

        let closes = bars.closes();
        let bands = bollinger_bands(&closes, bb_period, bb_std)?;
        let rsi_series = rsi(&closes, rsi_period)?;

        let mut signals = Vec::with_capacity(n);
        for i in 0..n {
            if i < warm_up {
                signals.push(Signal::hold(i, closes[i]));
                continue;
            }
            let close = closes[i];
            let (Some(lower), Some(middle), Some(rsi_val)) =
                (bands.lower[i], bands.middle[i], rsi_series[i])
            else {
                signals.push(Signal::hold(i, close));
                continue;
            };

            let signal = if close < lower && rsi_val < oversold {
                // Deeper stretch below the band reads as stronger conviction
                let stretch = ((lower - close) / lower * 100.0).min(1.0);
                Signal::enter_long(i, close).with_strength(0.5 + stretch / 2.0)
            } else if close >= middle || rsi_val >= overbought {
                Signal::exit(i, close)
            } else {
                Signal::hold(i, close)
            };
            signals.push(signal);
        }

        SignalSeries::new(signals, warm_up)
    }
}

//! MACD crossover strategy.

use crate::error::{Error, Result};
use crate::indicators::macd;
use crate::series::BarSeries;
use crate::signal::{Signal, SignalSeries};

use super::{
    ParamDomain, ParamValue, Params, SearchSpace, Strategy, crossed_above, crossed_below,
    params_from, period_param,
};

/// Enters long when the MACD line crosses above its signal line with a
/// positive histogram; exits on the reverse crossover.
#[derive(Debug, Clone, Default)]
pub struct MacdCrossover;

impl Strategy for MacdCrossover {
    fn name(&self) -> &str {
        "MACDCrossover"
    }

    fn default_params(&self) -> Params {
        params_from(&[
            ("fast", ParamValue::Int(12)),
            ("slow", ParamValue::Int(26)),
            ("signal", ParamValue::Int(9)),
        ])
    }

    fn search_space(&self) -> SearchSpace {
        vec![
            ("fast".into(), ParamDomain::IntRange { lo: 5, hi: 20 }),
            ("slow".into(), ParamDomain::IntRange { lo: 20, hi: 50 }),
            ("signal".into(), ParamDomain::IntRange { lo: 5, hi: 15 }),
        ]
    }

    fn validate(&self, params: &Params) -> Result<()> {
        super::validate_against_space(&self.search_space(), params)?;
        let fast = period_param(params, "fast")?;
        let slow = period_param(params, "slow")?;
        if slow <= fast {
            return Err(Error::invalid_input(
                "slow",
                format!("must exceed fast ({slow} <= {fast})"),
            ));
        }
        Ok(())
    }

    fn warm_up(&self, params: &Params) -> usize {
        let slow = period_param(params, "slow").unwrap_or(26);
        let signal = period_param(params, "signal").unwrap_or(9);
        // One bar past the signal line's first defined index, so a crossover
        // has a previous value to compare against.
        slow + signal - 1
    }

    fn compute(&self, bars: &BarSeries, params: &Params) -> Result<SignalSeries> {
        self.validate(params)?;
        let fast = period_param(params, "fast")?;
        let slow = period_param(params, "slow")?;
        let signal_period = period_param(params, "signal")?;

        let warm_up = self.warm_up(params);
        let n = bars.len();
        if n <= warm_up {
            return Ok(SignalSeries::all_hold(n));
        }

        let closes = bars.closes();
        let result = macd(&closes, fast, slow, signal_period)?;

        let mut signals = Vec::with_capacity(n);
        for i in 0..n {
            if i < warm_up {
                signals.push(Signal::hold(i, closes[i]));
                continue;
            }
            let signal = if crossed_above(&result.macd_line, &result.signal_line, i)
                && result.histogram[i].is_some_and(|h| h > 0.0)
            {
                Signal::enter_long(i, closes[i])
            } else if crossed_below(&result.macd_line, &result.signal_line, i) {
                Signal::exit(i, closes[i])
            } else {
                Signal::hold(i, closes[i])
            };
            signals.push(signal);
        }

        SignalSeries::new(signals, warm_up)
    }
}

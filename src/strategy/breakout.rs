//! Breakout strategy: lookback-high breaks confirmed by volume.

use crate::error::Result;
use crate::indicators::sma;
use crate::series::BarSeries;
use crate::signal::{Signal, SignalSeries};

use super::{
    ParamDomain, ParamValue, Params, SearchSpace, Strategy, float_param, params_from,
    period_param,
};

/// Enters long when the close clears the highest high of the previous
/// `lookback` bars on above-average volume; exits when the close drops
/// under the lookback low. The lookback low doubles as the stop hint so
/// the engine can size the position off a concrete risk distance.
#[derive(Debug, Clone, Default)]
pub struct Breakout;

impl Strategy for Breakout {
    fn name(&self) -> &str {
        "Breakout"
    }

    fn default_params(&self) -> Params {
        params_from(&[
            ("lookback", ParamValue::Int(20)),
            ("volume_mult", ParamValue::Float(1.2)),
        ])
    }

    fn search_space(&self) -> SearchSpace {
        vec![
            ("lookback".into(), ParamDomain::IntRange { lo: 10, hi: 60 }),
            (
                "volume_mult".into(),
                ParamDomain::FloatRange { lo: 1.0, hi: 2.5, step: Some(0.1) },
            ),
        ]
    }

    fn warm_up(&self, params: &Params) -> usize {
        period_param(params, "lookback").unwrap_or(20)
    }

    fn compute(&self, bars: &BarSeries, params: &Params) -> Result<SignalSeries> {
        self.validate(params)?;
        let lookback = period_param(params, "lookback")?;
        let volume_mult = float_param(params, "volume_mult")?;

        let n = bars.len();
        if n <= lookback {
            return Ok(SignalSeries::all_hold(n));
        }

        let closes = bars.closes();
        let highs = bars.highs();
        let lows = bars.lows();
        let volumes = bars.volumes();
        let vol_sma = sma(&volumes, lookback);

        let mut signals = Vec::with_capacity(n);
        for i in 0..n {
            if i < lookback {
                signals.push(Signal::hold(i, closes[i]));
                continue;
            }
            let window_high = highs[i - lookback..i]
                .iter()
                .cloned()
                .fold(f64::MIN, f64::max);
            let window_low = lows[i - lookback..i]
                .iter()
                .cloned()
                .fold(f64::MAX, f64::min);
            // Average volume over the bars preceding the breakout candidate
            let avg_volume = vol_sma[i - 1];

            let signal = if closes[i] > window_high
                && avg_volume.is_some_and(|v| volumes[i] >= volume_mult * v)
            {
                Signal::enter_long(i, closes[i]).with_stop(window_low)
            } else if closes[i] < window_low {
                Signal::exit(i, closes[i])
            } else {
                Signal::hold(i, closes[i])
            };
            signals.push(signal);
        }

        SignalSeries::new(signals, lookback)
    }
}

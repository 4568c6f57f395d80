//! Kelly-fraction position sizing overlay.

use std::collections::VecDeque;

use crate::error::Result;
use crate::indicators::atr;
use crate::series::BarSeries;
use crate::signal::{Signal, SignalAction, SignalSeries};

use super::{
    ParamDomain, ParamValue, Params, SearchSpace, Strategy, float_param, period_param,
};

/// Wraps any strategy and annotates its entry signals with a `size_hint`.
///
/// The hint is `kelly_fraction * (risk_budget / atr)` clipped to
/// `[0, max_fraction]`, where the Kelly fraction `(p*b - q) / b` is estimated
/// from a rolling window of the inner strategy's own simulated round-trips.
/// Until the window holds `min_samples` outcomes the hint falls back to
/// `base_fraction`.
#[derive(Debug, Clone)]
pub struct DynamicSizing<S> {
    inner: S,
}

impl<S: Strategy> DynamicSizing<S> {
    /// Wrap `inner` with dynamic sizing.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped strategy.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Strategy> Strategy for DynamicSizing<S> {
    fn name(&self) -> &str {
        "DynamicPositionSizing"
    }

    fn default_params(&self) -> Params {
        let mut params = self.inner.default_params();
        params.insert("atr_period".into(), ParamValue::Int(14));
        params.insert("kelly_window".into(), ParamValue::Int(30));
        params.insert("min_samples".into(), ParamValue::Int(10));
        params.insert("base_fraction".into(), ParamValue::Float(0.05));
        params.insert("max_fraction".into(), ParamValue::Float(0.25));
        params.insert("risk_budget".into(), ParamValue::Float(1.0));
        params
    }

    fn search_space(&self) -> SearchSpace {
        let mut space = self.inner.search_space();
        space.push((
            "kelly_window".into(),
            ParamDomain::IntRange { lo: 10, hi: 60 },
        ));
        space.push((
            "max_fraction".into(),
            ParamDomain::FloatRange { lo: 0.05, hi: 0.5, step: None },
        ));
        space
    }

    fn validate(&self, params: &Params) -> Result<()> {
        self.inner.validate(params)?;
        super::validate_against_space(&self.search_space(), params)
    }

    fn warm_up(&self, params: &Params) -> usize {
        let atr_period = period_param(params, "atr_period").unwrap_or(14);
        self.inner.warm_up(params).max(atr_period + 1)
    }

    fn compute(&self, bars: &BarSeries, params: &Params) -> Result<SignalSeries> {
        self.validate(params)?;
        let atr_period = period_param(params, "atr_period")?;
        let kelly_window = period_param(params, "kelly_window")?;
        let min_samples = period_param(params, "min_samples")?;
        let base_fraction = float_param(params, "base_fraction")?;
        let max_fraction = float_param(params, "max_fraction")?;
        let risk_budget = float_param(params, "risk_budget")?;

        let n = bars.len();
        let warm_up = self.warm_up(params);
        if n <= warm_up {
            return Ok(SignalSeries::all_hold(n));
        }

        let inner_series = self.inner.compute(bars, params)?;
        let atr_series = atr(&bars.highs(), &bars.lows(), &bars.closes(), atr_period)?;

        // Simulate the inner strategy's round-trips to maintain the rolling
        // outcome window the Kelly estimate feeds on.
        let mut outcomes: VecDeque<f64> = VecDeque::with_capacity(kelly_window);
        let mut open_entry: Option<f64> = None;

        let mut signals = Vec::with_capacity(n);
        for signal in inner_series.signals() {
            // The ATR filter may push this wrapper's warm-up past the inner
            // strategy's; suppress anything the inner emits before it.
            if signal.index < warm_up {
                signals.push(Signal::hold(signal.index, signal.price));
                continue;
            }
            let mut out = signal.clone();
            match signal.action {
                SignalAction::EnterLong | SignalAction::EnterShort => {
                    if open_entry.is_none() {
                        open_entry = Some(signal.price);
                    }
                    let fraction = if outcomes.len() < min_samples {
                        base_fraction
                    } else {
                        let kelly = kelly_fraction(outcomes.make_contiguous());
                        match atr_series[signal.index] {
                            Some(atr_val) if atr_val > 0.0 => {
                                (kelly * risk_budget / atr_val).clamp(0.0, max_fraction)
                            }
                            _ => base_fraction,
                        }
                    };
                    out = out.with_size_hint(fraction);
                }
                SignalAction::Exit => {
                    if let Some(entry) = open_entry.take()
                        && entry > 0.0
                    {
                        let ret = (signal.price - entry) / entry;
                        if outcomes.len() == kelly_window {
                            outcomes.pop_front();
                        }
                        outcomes.push_back(ret);
                    }
                }
                SignalAction::Hold => {}
            }
            signals.push(out);
        }

        SignalSeries::new(signals, warm_up.max(inner_series.first_usable()))
    }
}

/// Kelly fraction `(p*b - q) / b` from a window of round-trip returns,
/// floored at zero. With no losses the payoff ratio is undefined and the
/// win probability itself is used.
fn kelly_fraction(returns: &[f64]) -> f64 {
    let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
    let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if wins.is_empty() {
        return 0.0;
    }
    let p = wins.len() as f64 / returns.len() as f64;
    if losses.is_empty() {
        return p;
    }
    let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
    let avg_loss = losses.iter().map(|r| r.abs()).sum::<f64>() / losses.len() as f64;
    let b = avg_win / avg_loss;
    ((p * b - (1.0 - p)) / b).max(0.0)
}

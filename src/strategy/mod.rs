//! Strategy trait, parameter schema and the shipped strategy variants.
//!
//! A strategy is a value: it declares its name, default parameters and a
//! search space, and turns a [`BarSeries`] plus a parameter set into an
//! aligned [`SignalSeries`]. `compute` is pure and deterministic — identical
//! inputs yield identical outputs — which is what makes walk-forward
//! optimisation reproducible.
//!
//! # Available strategies
//!
//! | Strategy | Idea |
//! |----------|------|
//! | [`TrendFollowing`] | EMA crossover gated by RSI |
//! | [`MeanReversion`] | Bollinger lower band + RSI oversold |
//! | [`Breakout`] | Lookback-high breakout with volume confirmation |
//! | [`MacdCrossover`] | MACD/signal line cross |
//! | [`RsiDivergence`] | Price/RSI pivot divergences, ADX + volume confirmed |
//! | [`DynamicSizing`] | Kelly-fraction size-hint overlay over any strategy |
//! | [`Wave3`] | Daily-context, hourly-trigger trend continuation |

mod breakout;
mod macd_crossover;
mod mean_reversion;
mod rsi_divergence;
mod sizing;
mod trend_following;
mod wave3;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::series::BarSeries;
use crate::signal::SignalSeries;

pub use breakout::Breakout;
pub use macd_crossover::MacdCrossover;
pub use mean_reversion::MeanReversion;
pub use rsi_divergence::RsiDivergence;
pub use sizing::DynamicSizing;
pub use trend_following::TrendFollowing;
pub use wave3::Wave3;

/// A single strategy parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer parameter (e.g. a period length)
    Int(i64),
    /// Floating-point parameter (e.g. a multiplier or threshold)
    Float(f64),
}

impl ParamValue {
    /// Return the value as `i64`, truncating floats.
    pub fn as_int(&self) -> i64 {
        match self {
            ParamValue::Int(v) => *v,
            ParamValue::Float(v) => *v as i64,
        }
    }

    /// Return the value as `f64`.
    pub fn as_float(&self) -> f64 {
        match self {
            ParamValue::Int(v) => *v as f64,
            ParamValue::Float(v) => *v,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v:.4}"),
        }
    }
}

/// Named parameter values, ordered for reproducibility.
pub type Params = BTreeMap<String, ParamValue>;

/// The domain a single parameter may range over during optimisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamDomain {
    /// Inclusive integer range
    IntRange {
        /// Smallest admissible value
        lo: i64,
        /// Largest admissible value
        hi: i64,
    },
    /// Inclusive real range with an optional step
    FloatRange {
        /// Smallest admissible value
        lo: f64,
        /// Largest admissible value
        hi: f64,
        /// Grid step; `None` means continuous
        step: Option<f64>,
    },
    /// Explicit set of admissible values
    Choice(Vec<ParamValue>),
}

impl ParamDomain {
    /// Whether `value` lies inside this domain.
    pub fn contains(&self, value: &ParamValue) -> bool {
        match self {
            Self::IntRange { lo, hi } => {
                matches!(value, ParamValue::Int(v) if lo <= v && v <= hi)
            }
            Self::FloatRange { lo, hi, .. } => {
                let v = value.as_float();
                *lo <= v && v <= *hi
            }
            Self::Choice(values) => values.contains(value),
        }
    }
}

/// Ordered per-parameter domains declared by a strategy.
pub type SearchSpace = Vec<(String, ParamDomain)>;

/// Fetch an integer parameter, accepting a float that truncates cleanly.
pub fn int_param(params: &Params, name: &str) -> Result<i64> {
    params
        .get(name)
        .map(ParamValue::as_int)
        .ok_or_else(|| Error::invalid_input(name, "missing parameter"))
}

/// Fetch an integer parameter as a period length (must be positive).
pub fn period_param(params: &Params, name: &str) -> Result<usize> {
    let v = int_param(params, name)?;
    if v <= 0 {
        return Err(Error::invalid_input(name, format!("period must be positive, got {v}")));
    }
    Ok(v as usize)
}

/// Fetch a float parameter.
pub fn float_param(params: &Params, name: &str) -> Result<f64> {
    params
        .get(name)
        .map(ParamValue::as_float)
        .ok_or_else(|| Error::invalid_input(name, "missing parameter"))
}

/// A trading strategy as a polymorphic value.
///
/// Implementations must keep [`compute`](Self::compute) pure: no I/O, no
/// interior mutability, no dependence on anything but the inputs. Every bar
/// index below [`warm_up`](Self::warm_up) must carry a `Hold` signal, and a
/// series shorter than the warm-up yields an all-hold series rather than an
/// error.
pub trait Strategy: Send + Sync {
    /// Strategy name (for reporting).
    fn name(&self) -> &str;

    /// The parameter set used when the caller supplies none.
    fn default_params(&self) -> Params;

    /// Per-parameter optimisation domains, in declaration order.
    fn search_space(&self) -> SearchSpace;

    /// Check a parameter set against the search space and any cross-parameter
    /// constraints. The optimiser treats a validation failure as the worst
    /// possible score rather than an abort.
    fn validate(&self, params: &Params) -> Result<()> {
        validate_against_space(&self.search_space(), params)
    }

    /// Number of leading bars for which `compute` emits `Hold`.
    fn warm_up(&self, params: &Params) -> usize;

    /// Produce one signal per bar, aligned to `bars`.
    fn compute(&self, bars: &BarSeries, params: &Params) -> Result<SignalSeries>;
}

impl Strategy for Box<dyn Strategy> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn default_params(&self) -> Params {
        (**self).default_params()
    }
    fn search_space(&self) -> SearchSpace {
        (**self).search_space()
    }
    fn validate(&self, params: &Params) -> Result<()> {
        (**self).validate(params)
    }
    fn warm_up(&self, params: &Params) -> usize {
        (**self).warm_up(params)
    }
    fn compute(&self, bars: &BarSeries, params: &Params) -> Result<SignalSeries> {
        (**self).compute(bars, params)
    }
}

/// Check that every declared parameter is present and inside its domain.
pub fn validate_against_space(space: &SearchSpace, params: &Params) -> Result<()> {
    for (name, domain) in space {
        let value = params
            .get(name)
            .ok_or_else(|| Error::invalid_input(name.clone(), "missing parameter"))?;
        if !domain.contains(value) {
            return Err(Error::invalid_input(
                name.clone(),
                format!("value {value} outside domain {domain:?}"),
            ));
        }
    }
    Ok(())
}

/// Convenience for building a params map from literals.
pub(crate) fn params_from(entries: &[(&str, ParamValue)]) -> Params {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Strict crossover: `fast` was below `slow` on the previous bar and is
/// above it now. All four values must be defined.
pub(crate) fn crossed_above(fast: &[Option<f64>], slow: &[Option<f64>], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    match (fast[i - 1], slow[i - 1], fast[i], slow[i]) {
        (Some(fp), Some(sp), Some(f), Some(s)) => fp < sp && f > s,
        _ => false,
    }
}

/// Strict crossunder: `fast` was above `slow` on the previous bar and is
/// below it now.
pub(crate) fn crossed_below(fast: &[Option<f64>], slow: &[Option<f64>], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    match (fast[i - 1], slow[i - 1], fast[i], slow[i]) {
        (Some(fp), Some(sp), Some(f), Some(s)) => fp > sp && f < s,
        _ => false,
    }
}

//! Per-bar trading signals and the aligned series strategies emit.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Discrete per-bar recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    /// Open a long position
    EnterLong,
    /// Open a short position
    EnterShort,
    /// Close the open position
    Exit,
    /// Do nothing
    Hold,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnterLong => write!(f, "ENTER_LONG"),
            Self::EnterShort => write!(f, "ENTER_SHORT"),
            Self::Exit => write!(f, "EXIT"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// A signal tied to a specific bar index.
///
/// `price` is the suggested entry/exit reference (usually that bar's close).
/// A `Hold` signal carrying a `stop` is a trailing-stop ratchet: the engine
/// tightens the protective stop of an open position to that level, never
/// loosening it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Bar index the signal was emitted for
    pub index: usize,
    /// Recommended action
    pub action: SignalAction,
    /// Reference price (usually the bar close)
    pub price: f64,
    /// Protective stop price
    pub stop: Option<f64>,
    /// Target price
    pub target: Option<f64>,
    /// Size hint as a fraction of equity at risk
    pub size_hint: Option<f64>,
    /// Conviction in `[0, 1]`
    pub strength: f64,
}

impl Signal {
    /// A hold signal for bar `index` at the given reference price.
    pub fn hold(index: usize, price: f64) -> Self {
        Self {
            index,
            action: SignalAction::Hold,
            price,
            stop: None,
            target: None,
            size_hint: None,
            strength: 0.0,
        }
    }

    /// A long entry for bar `index` at the given reference price.
    pub fn enter_long(index: usize, price: f64) -> Self {
        Self {
            index,
            action: SignalAction::EnterLong,
            price,
            stop: None,
            target: None,
            size_hint: None,
            strength: 1.0,
        }
    }

    /// A short entry for bar `index` at the given reference price.
    pub fn enter_short(index: usize, price: f64) -> Self {
        Self {
            index,
            action: SignalAction::EnterShort,
            price,
            stop: None,
            target: None,
            size_hint: None,
            strength: 1.0,
        }
    }

    /// An exit for bar `index` at the given reference price.
    pub fn exit(index: usize, price: f64) -> Self {
        Self {
            index,
            action: SignalAction::Exit,
            price,
            stop: None,
            target: None,
            size_hint: None,
            strength: 1.0,
        }
    }

    /// Attach a protective stop price.
    pub fn with_stop(mut self, stop: f64) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Attach a target price.
    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    /// Attach a size hint (fraction of equity).
    pub fn with_size_hint(mut self, hint: f64) -> Self {
        self.size_hint = Some(hint);
        self
    }

    /// Set the conviction, clamped to `[0, 1]`.
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    /// True for `Hold`.
    pub fn is_hold(&self) -> bool {
        self.action == SignalAction::Hold
    }

    /// True for `EnterLong` or `EnterShort`.
    pub fn is_entry(&self) -> bool {
        matches!(self.action, SignalAction::EnterLong | SignalAction::EnterShort)
    }
}

/// One signal per bar index, aligned to a [`BarSeries`](crate::series::BarSeries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    signals: Vec<Signal>,
    /// First index at which the underlying indicators are defined
    first_usable: usize,
}

impl SignalSeries {
    /// Build from a per-bar signal vector.
    ///
    /// `first_usable` is the warm-up boundary: every signal below it must be
    /// `Hold`.
    pub fn new(signals: Vec<Signal>, first_usable: usize) -> Result<Self> {
        for (i, signal) in signals.iter().enumerate() {
            if signal.index != i {
                return Err(Error::invalid_input(
                    "signals",
                    format!("signal at position {i} carries index {}", signal.index),
                ));
            }
            if i < first_usable && !signal.is_hold() {
                return Err(Error::invalid_input(
                    "signals",
                    format!("non-hold signal at {i} inside warm-up ({first_usable})"),
                ));
            }
        }
        Ok(Self {
            signals,
            first_usable,
        })
    }

    /// An all-hold series of length `len` priced at zero.
    ///
    /// Used by strategies when the bar series is shorter than their warm-up.
    pub fn all_hold(len: usize) -> Self {
        Self {
            signals: (0..len).map(|i| Signal::hold(i, 0.0)).collect(),
            first_usable: len,
        }
    }

    /// Number of signals (equals the bar series length).
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// True when the series holds no signals.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// First index at which non-hold signals may appear.
    pub fn first_usable(&self) -> usize {
        self.first_usable
    }

    /// Signal for bar `i`.
    pub fn get(&self, i: usize) -> Option<&Signal> {
        self.signals.get(i)
    }

    /// All signals in bar order.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// The most recent signal (for the last bar).
    pub fn latest(&self) -> Option<&Signal> {
        self.signals.last()
    }
}

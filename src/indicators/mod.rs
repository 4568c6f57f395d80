//! Technical indicators over ordered bar data.
//!
//! Every indicator is a pure function from column slices (typically close
//! prices) to an aligned series of the same length. Positions inside the
//! warm-up prefix hold `None`; defined positions hold a finite `f64`.
//! Division by zero yields `None`, never infinity — `NaN` in an output is
//! always a defect.
//!
//! # Available indicators
//!
//! ## Moving averages
//! - [`sma`] - Simple Moving Average (warm-up `p - 1`)
//! - [`ema`] - Exponential Moving Average, SMA-seeded (warm-up `p - 1`)
//!
//! ## Momentum
//! - [`rsi`] - Relative Strength Index, Wilder smoothing (warm-up `p`)
//!
//! ## Trend
//! - [`macd`] - Moving Average Convergence Divergence (warm-up `slow + signal - 2`)
//! - [`adx`] - Average Directional Index with DI+/DI- (warm-up `2p`)
//!
//! ## Volatility
//! - [`bollinger_bands`] - Bollinger Bands (warm-up `p - 1`)
//! - [`atr`] - Average True Range, Wilder smoothing (warm-up `p`)
//! - [`true_range`] - Per-bar true range (warm-up 1)
//!
//! # Example
//!
//! ```
//! use b3_quant::indicators::{ema, rsi};
//!
//! let closes: Vec<f64> = (1..=40).map(|x| 100.0 + (x as f64 * 0.7).sin()).collect();
//! let ema_9 = ema(&closes, 9);
//! let rsi_14 = rsi(&closes, 14).unwrap();
//!
//! assert!(ema_9[7].is_none());
//! assert!(ema_9[8].is_some());
//! assert!(rsi_14[13].is_none());
//! assert!(rsi_14[14].is_some());
//! ```

mod adx;
mod atr;
mod bollinger;
mod ema;
mod macd;
mod rsi;
mod sma;
mod true_range;

pub use adx::{AdxResult, adx};
pub use atr::atr;
pub use bollinger::{BollingerBands, bollinger_bands};
pub use ema::ema;
pub use macd::{MacdResult, macd};
pub use rsi::rsi;
pub use sma::sma;
pub use true_range::true_range;

//! # b3-quant
//!
//! A quantitative trading research library for the Brazilian equities
//! market (B3): technical indicators over OHLCV bars, signal strategies, a
//! deterministic backtest engine with realistic position accounting, a
//! walk-forward optimizer with a pluggable Bayesian sampler, and a
//! paper-trading loop behind async ports.
//!
//! ## Quick start
//!
//! ```
//! use b3_quant::backtest::{BacktestConfig, BacktestEngine};
//! use b3_quant::series::{Bar, BarSeries, Timeframe};
//! use b3_quant::strategy::{Strategy, TrendFollowing};
//! use chrono::{TimeZone, Utc};
//!
//! # fn main() -> b3_quant::error::Result<()> {
//! let bars: Vec<Bar> = (0..250)
//!     .map(|i| {
//!         let c = 30.0 + (i as f64 * 0.15).sin() * 3.0 + i as f64 * 0.01;
//!         Bar::new(
//!             Utc.timestamp_opt(1_650_000_000 + i * 86_400, 0).unwrap(),
//!             c, c + 0.3, c - 0.3, c, 1_000_000.0,
//!         )
//!     })
//!     .collect();
//! let series = BarSeries::new("PETR4", Timeframe::D1, bars)?;
//!
//! let engine = BacktestEngine::new(BacktestConfig::default())?;
//! let strategy = TrendFollowing;
//! let result = engine.run(&strategy, &series, &strategy.default_params())?;
//!
//! println!(
//!     "{}: {} trades, return {:.2}%",
//!     result.symbol,
//!     result.metrics.total_trades,
//!     result.metrics.total_return_pct * 100.0,
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Walk-forward validation
//!
//! ```no_run
//! use b3_quant::strategy::TrendFollowing;
//! use b3_quant::walkforward::{OptimizeMetric, WalkForwardConfig};
//! # fn example(series: &b3_quant::series::BarSeries) -> b3_quant::error::Result<()> {
//! let report = WalkForwardConfig::new(252, 63)
//!     .metric(OptimizeMetric::SharpeRatio)
//!     .n_trials(50)
//!     .seed(42)
//!     .run(&TrendFollowing, series)?;
//! println!("{}", serde_json::to_string_pretty(&report).unwrap());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Backtest engine, configuration, position accounting and metrics
pub mod backtest;
/// Run-level cooperative cancellation
pub mod cancel;
/// Error types and result definitions
pub mod error;
/// Technical indicators over bar data
pub mod indicators;
/// Paper-trading runner and its ports
pub mod paper;
/// In-memory reference implementations of the external ports
pub mod provider;
/// OHLCV bars and bar series
pub mod series;
/// Per-bar signals
pub mod signal;
/// Strategy trait and shipped strategy variants
pub mod strategy;
/// Walk-forward optimisation
pub mod walkforward;

// Re-export the types most callers touch
pub use backtest::{BacktestConfig, BacktestEngine, BacktestResult};
pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use series::{Bar, BarSeries, Timeframe};
pub use signal::{Signal, SignalAction, SignalSeries};
pub use strategy::Strategy;
pub use walkforward::{WalkForwardConfig, WalkForwardReport};

//! Backtesting engine for strategy simulation.
//!
//! Consumes a [`BarSeries`](crate::series::BarSeries) plus an aligned
//! [`SignalSeries`](crate::signal::SignalSeries) and produces a trade
//! ledger, an equity curve and a metrics block. Execution is deterministic:
//! identical inputs yield identical ledgers.
//!
//! # Quick start
//!
//! ```
//! use b3_quant::backtest::{BacktestConfig, BacktestEngine};
//! use b3_quant::strategy::{MeanReversion, Strategy};
//! use b3_quant::series::{Bar, BarSeries, Timeframe};
//! use chrono::{TimeZone, Utc};
//!
//! let bars: Vec<Bar> = (0..300)
//!     .map(|i| {
//!         let c = 100.0 + 5.0 * (i as f64 * 0.3).sin();
//!         Bar::new(
//!             Utc.timestamp_opt(1_600_000_000 + i * 86_400, 0).unwrap(),
//!             c, c + 0.5, c - 0.5, c, 1_000.0,
//!         )
//!     })
//!     .collect();
//! let series = BarSeries::new("VALE3", Timeframe::D1, bars).unwrap();
//!
//! let engine = BacktestEngine::new(BacktestConfig::default()).unwrap();
//! let strategy = MeanReversion;
//! let result = engine.run(&strategy, &series, &strategy.default_params()).unwrap();
//!
//! println!("{} trades, return {:.2}", result.metrics.total_trades, result.metrics.total_return);
//! ```

mod config;
mod engine;
mod position;
mod result;

pub use config::{BacktestConfig, BacktestConfigBuilder};
pub use engine::BacktestEngine;
pub use position::{ExitReason, Position, PositionSide, Trade};
pub use result::{
    BacktestReport, BacktestResult, EquityPoint, EquityTick, MetricsBlock,
    PROFIT_FACTOR_NO_LOSSES, ReportPeriod,
};

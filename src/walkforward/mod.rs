//! Walk-forward parameter optimisation.
//!
//! Walk-forward validation prevents overfitting by splitting history into
//! (train, test) window pairs: parameters are searched on each train slice
//! with a sequential model-based sampler using the backtest engine as the
//! fitness oracle, then evaluated untouched on the adjacent test slice.
//!
//! ```text
//! |--- train ---|--- test ---|
//! |------- train -------|--- test ---|          (anchored)
//!        |--- train ---|--- test ---|           (rolling)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use b3_quant::strategy::TrendFollowing;
//! use b3_quant::walkforward::{OptimizeMetric, WalkForwardConfig};
//! # fn example(bars: &b3_quant::series::BarSeries) -> b3_quant::error::Result<()> {
//! let report = WalkForwardConfig::new(252, 63)
//!     .metric(OptimizeMetric::SharpeRatio)
//!     .n_trials(50)
//!     .seed(42)
//!     .run(&TrendFollowing, bars)?;
//!
//! println!(
//!     "{} windows, {} positive",
//!     report.aggregate_statistics.total_windows,
//!     report.aggregate_statistics.positive_windows,
//! );
//! # Ok(())
//! # }
//! ```

mod driver;
mod report;
mod sampler;
mod window;

pub use driver::{OptimizeMetric, SamplerKind, WalkForwardConfig};
pub use report::{AggregateStats, RangeMeta, WalkForwardReport, WindowPeriod, WindowResult};
pub use sampler::{RandomSampler, Sampler, TpeSampler, Trial};
pub use window::{SkippedWindow, Window, generate_windows};

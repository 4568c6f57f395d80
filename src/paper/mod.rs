//! Forward-simulated ("paper") trading loop.
//!
//! The runner reuses the strategies and the backtest engine's position
//! bookkeeping on live-shaped data: bars arrive through the
//! [`BarSeriesProvider`] port, position transitions persist through the
//! [`PositionStore`] port, and the loop itself is a single-threaded
//! cooperative task driven by a timer or external cron.

mod ports;
mod runner;

pub use ports::{BarSeriesProvider, PaperPosition, PositionStore};
pub use runner::{PaperRunner, PaperRunnerConfig};

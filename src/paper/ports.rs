//! Ports the paper runner drives: bar data in, position state out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backtest::{PositionSide, Trade};
use crate::error::Result;
use crate::series::{BarSeries, Timeframe};

/// Source of historical and recent bars.
///
/// The core never assumes a particular backing store: CSV files, a columnar
/// database or an in-process buffer all satisfy the port. `Ok(None)` means
/// the symbol/range is unknown; transport failures surface as
/// [`Error::Provider`](crate::error::Error::Provider).
#[async_trait]
pub trait BarSeriesProvider: Send + Sync {
    /// Load bars for `symbol` in `[start, end]`.
    async fn load(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<BarSeries>>;
}

/// An open simulated position as persisted by the storage port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperPosition {
    /// Deterministic id (`"{symbol}-{entry unix ts}"`), the idempotency key
    pub id: String,
    /// Symbol
    pub symbol: String,
    /// Direction
    pub side: PositionSide,
    /// Quantity
    pub quantity: f64,
    /// Entry timestamp
    pub entry_time: DateTime<Utc>,
    /// Entry price
    pub entry_price: f64,
    /// Protective stop, ratcheted by trailing signals
    pub stop: Option<f64>,
    /// Target price
    pub target: Option<f64>,
}

impl PaperPosition {
    /// Unrealized gross P&L at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        let sign = match self.side {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        };
        (price - self.entry_price) * self.quantity * sign
    }

    /// Notional at entry.
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }
}

/// Persistence for paper-trading state transitions.
///
/// The port is idempotent: replaying `open_position` with an id that is
/// already open, or `close_position` with an id that is already closed,
/// must be a no-op. The runner relies on this to survive restarts between
/// a write and its acknowledgement.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Record a newly opened position.
    async fn open_position(&self, position: &PaperPosition) -> Result<()>;

    /// Record a close: the realized trade plus an equity snapshot taken at
    /// the transition.
    async fn close_position(
        &self,
        position_id: &str,
        trade: &Trade,
        equity_snapshot: f64,
    ) -> Result<()>;

    /// All currently open positions, used to rebuild the in-memory mirror
    /// on restart.
    async fn load_open_positions(&self) -> Result<Vec<PaperPosition>>;
}

//! Position and trade types for the simulated account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    /// Long position (profit when price rises)
    Long,
    /// Short position (profit when price falls)
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// The target price was touched
    TakeProfit,
    /// The protective stop was touched
    StopLoss,
    /// The strategy emitted an exit signal
    SignalExit,
    /// The series ended with the position still open
    EndOfData,
}

/// An open position inside one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Direction
    pub side: PositionSide,
    /// Bar index of the entry
    pub entry_index: usize,
    /// Entry timestamp
    pub entry_time: DateTime<Utc>,
    /// Entry fill price (after slippage)
    pub entry_price: f64,
    /// Quantity (whole or fractional shares per configuration)
    pub quantity: f64,
    /// Protective stop, possibly ratcheted by trailing signals
    pub stop: Option<f64>,
    /// Target price
    pub target: Option<f64>,
    /// Commission paid on entry
    pub entry_commission: f64,
    /// The signal that opened the position
    pub entry_signal: Signal,
}

impl Position {
    /// Notional at entry.
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Unrealized gross P&L at `price` (before commissions).
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity * self.side.sign()
    }

    /// Mark-to-market value: entry notional plus unrealized gross P&L.
    ///
    /// For a long this equals `quantity * price`; for a short it reflects
    /// the margin posted at entry plus the gain from the price decline.
    pub fn market_value(&self, price: f64) -> f64 {
        self.entry_value() + self.unrealized_pnl(price)
    }

    /// True for long positions.
    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    /// Close this position into a [`Trade`].
    ///
    /// `exit_commission` is added to the entry commission; the trade's `pnl`
    /// is net of both.
    pub fn close(
        self,
        symbol: &str,
        exit_index: usize,
        exit_time: DateTime<Utc>,
        exit_price: f64,
        exit_commission: f64,
        reason: ExitReason,
    ) -> Trade {
        let gross = self.unrealized_pnl(exit_price);
        let commission = self.entry_commission + exit_commission;
        let pnl = gross - commission;
        let entry_value = self.entry_value();
        let pnl_pct = if entry_value > 0.0 {
            pnl / entry_value * 100.0
        } else {
            0.0
        };
        let bars_held = exit_index.saturating_sub(self.entry_index);
        let days_held =
            (exit_time - self.entry_time).num_seconds() as f64 / 86_400.0;

        Trade {
            symbol: symbol.to_string(),
            side: self.side,
            quantity: self.quantity,
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            exit_time,
            exit_price,
            reason,
            pnl,
            pnl_pct,
            commission,
            bars_held,
            days_held,
        }
    }
}

/// A closed round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Symbol traded
    pub symbol: String,
    /// Direction
    pub side: PositionSide,
    /// Quantity
    pub quantity: f64,
    /// Entry timestamp
    pub entry_time: DateTime<Utc>,
    /// Entry fill price
    pub entry_price: f64,
    /// Exit timestamp
    pub exit_time: DateTime<Utc>,
    /// Exit fill price
    pub exit_price: f64,
    /// Why the trade closed
    pub reason: ExitReason,
    /// Realized P&L in currency, net of commissions
    pub pnl: f64,
    /// Realized P&L as percent of entry notional
    pub pnl_pct: f64,
    /// Total commission paid (entry + exit)
    pub commission: f64,
    /// Holding duration in bars
    pub bars_held: usize,
    /// Holding duration in calendar days
    pub days_held: f64,
}

impl Trade {
    /// Notional at entry.
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// True when the trade made money.
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    /// True when the trade lost money.
    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}

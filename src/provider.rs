//! In-memory implementations of the data and storage ports.
//!
//! These are the reference port implementations: tests and examples run
//! against them, and they document the exact semantics (slicing, idempotent
//! writes) an external adapter must honour.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backtest::Trade;
use crate::error::Result;
use crate::paper::{BarSeriesProvider, PaperPosition, PositionStore};
use crate::series::{BarSeries, Timeframe};

/// A [`BarSeriesProvider`] backed by an in-process map of series.
#[derive(Default)]
pub struct InMemoryBarProvider {
    data: Mutex<HashMap<(String, Timeframe), BarSeries>>,
}

impl InMemoryBarProvider {
    /// An empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series under its own symbol and timeframe.
    pub fn insert(&self, series: BarSeries) {
        let key = (series.symbol().to_string(), series.timeframe());
        self.data.lock().unwrap().insert(key, series);
    }
}

#[async_trait]
impl BarSeriesProvider for InMemoryBarProvider {
    async fn load(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<BarSeries>> {
        let data = self.data.lock().unwrap();
        let Some(series) = data.get(&(symbol.to_string(), timeframe)) else {
            return Ok(None);
        };
        // An empty intersection is "not found", not an error
        Ok(series.slice_time(start, end).ok())
    }
}

/// A closed-position record kept by [`InMemoryPositionStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedRecord {
    /// Id of the position that closed
    pub position_id: String,
    /// The realized trade
    pub trade: Trade,
    /// Account equity at the transition
    pub equity_snapshot: f64,
}

#[derive(Default)]
struct StoreState {
    open: BTreeMap<String, PaperPosition>,
    closed: Vec<ClosedRecord>,
}

/// A [`PositionStore`] backed by process memory.
///
/// Writes are idempotent by position id, matching the port contract:
/// re-opening an existing id or re-closing a missing one is a no-op.
#[derive(Default)]
pub struct InMemoryPositionStore {
    state: Mutex<StoreState>,
}

impl InMemoryPositionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All close records so far, in order.
    pub fn closed(&self) -> Vec<ClosedRecord> {
        self.state.lock().unwrap().closed.clone()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn open_position(&self, position: &PaperPosition) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .open
            .entry(position.id.clone())
            .or_insert_with(|| position.clone());
        Ok(())
    }

    async fn close_position(
        &self,
        position_id: &str,
        trade: &Trade,
        equity_snapshot: f64,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.open.remove(position_id).is_none() {
            // Replay of an already-closed id: no-op
            return Ok(());
        }
        state.closed.push(ClosedRecord {
            position_id: position_id.to_string(),
            trade: trade.clone(),
            equity_snapshot,
        });
        Ok(())
    }

    async fn load_open_positions(&self) -> Result<Vec<PaperPosition>> {
        Ok(self.state.lock().unwrap().open.values().cloned().collect())
    }
}

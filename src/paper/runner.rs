//! The paper-trading scan loop.

use std::collections::HashMap;

use chrono::{Duration, Utc};

use crate::backtest::{ExitReason, PositionSide, Trade};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::series::{Bar, BarSeries, Timeframe};
use crate::signal::{Signal, SignalAction};
use crate::strategy::{Params, Strategy};

use super::ports::{BarSeriesProvider, PaperPosition, PositionStore};

/// Paper runner configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PaperRunnerConfig {
    /// Symbols scanned on every tick
    pub symbols: Vec<String>,
    /// Bar cadence requested from the provider
    pub timeframe: Timeframe,
    /// Bars fetched per scan; must cover the strategy warm-up
    pub lookback_bars: usize,
    /// Seconds between scans when driven by [`PaperRunner::run`]
    pub scan_interval_secs: u64,
    /// Cap on simultaneously open paper positions
    pub max_positions: usize,
    /// Starting cash for the simulated account
    pub initial_capital: f64,
    /// Notional allocated per entry
    pub capital_per_trade: f64,
    /// Allow fractional quantities
    pub fractional_shares: bool,
}

impl Default for PaperRunnerConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            timeframe: Timeframe::H1,
            lookback_bars: 300,
            scan_interval_secs: 60,
            max_positions: 3,
            initial_capital: 100_000.0,
            capital_per_trade: 10_000.0,
            fractional_shares: false,
        }
    }
}

impl PaperRunnerConfig {
    fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(Error::invalid_input("symbols", "watchlist must not be empty"));
        }
        if self.lookback_bars == 0 {
            return Err(Error::invalid_input("lookback_bars", "must be positive"));
        }
        if self.max_positions == 0 {
            return Err(Error::invalid_input("max_positions", "must be at least 1"));
        }
        if self.capital_per_trade <= 0.0 || self.initial_capital <= 0.0 {
            return Err(Error::invalid_input(
                "capital_per_trade",
                "capital figures must be positive",
            ));
        }
        Ok(())
    }
}

/// Forward-simulated trading loop.
///
/// On every tick, per watched symbol: fetch the most recent bars, re-check
/// an open position's stop and target against the latest bar's range (stop
/// first, the engine's tie-break), otherwise compute the strategy's latest
/// signal and open or close accordingly. All position state flows through
/// the [`PositionStore`] port; the in-memory mirror is rebuilt from it by
/// [`resume`](Self::resume) after a restart.
///
/// The runner is strictly single-threaded within a process: positions are
/// mutated only on this loop.
pub struct PaperRunner<S, P, St> {
    strategy: S,
    params: Params,
    provider: P,
    store: St,
    config: PaperRunnerConfig,
    open: HashMap<String, PaperPosition>,
    cash: f64,
}

impl<S, P, St> PaperRunner<S, P, St>
where
    S: Strategy,
    P: BarSeriesProvider,
    St: PositionStore,
{
    /// Create a runner. Validates the configuration and the strategy
    /// parameters.
    pub fn new(
        strategy: S,
        params: Params,
        provider: P,
        store: St,
        config: PaperRunnerConfig,
    ) -> Result<Self> {
        config.validate()?;
        strategy.validate(&params)?;
        let cash = config.initial_capital;
        Ok(Self {
            strategy,
            params,
            provider,
            store,
            config,
            open: HashMap::new(),
            cash,
        })
    }

    /// Rebuild the in-memory position mirror from the storage port.
    pub async fn resume(&mut self) -> Result<()> {
        let positions = self.store.load_open_positions().await?;
        self.open = positions
            .into_iter()
            .map(|p| (p.symbol.clone(), p))
            .collect();
        self.cash = self.config.initial_capital
            - self.open.values().map(PaperPosition::entry_value).sum::<f64>();
        tracing::info!(open = self.open.len(), "paper runner state rebuilt");
        Ok(())
    }

    /// Currently open positions.
    pub fn open_positions(&self) -> impl Iterator<Item = &PaperPosition> {
        self.open.values()
    }

    /// Simulated equity: cash plus open positions at their entry marks.
    pub fn equity(&self) -> f64 {
        self.cash + self.open.values().map(PaperPosition::entry_value).sum::<f64>()
    }

    /// Scan every watched symbol once.
    pub async fn tick(&mut self) -> Result<()> {
        let symbols = self.config.symbols.clone();
        for symbol in symbols {
            if let Err(err) = self.scan_symbol(&symbol).await {
                match err {
                    // Provider failures propagate; the core does not retry
                    Error::Provider(_) => return Err(err),
                    other => {
                        tracing::warn!(symbol = %symbol, error = %other, "scan failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Drive [`tick`](Self::tick) on the configured interval until the
    /// token is cancelled.
    pub async fn run(&mut self, cancel: CancelToken) -> Result<()> {
        self.resume().await?;
        let period = std::time::Duration::from_secs(self.config.scan_interval_secs.max(1));
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            timer.tick().await;
            if cancel.is_cancelled() {
                return Ok(());
            }
            self.tick().await?;
        }
    }

    async fn scan_symbol(&mut self, symbol: &str) -> Result<()> {
        let timeframe = self.config.timeframe;
        let end = Utc::now();
        // Generous window so calendar gaps still yield enough bars
        let start = end - bar_span(timeframe) * (self.config.lookback_bars as i32 * 2);
        let Some(series) = self.provider.load(symbol, timeframe, start, end).await? else {
            tracing::warn!(symbol = %symbol, "provider returned no bars");
            return Ok(());
        };

        let series = if series.len() > self.config.lookback_bars {
            series.slice(series.len() - self.config.lookback_bars, series.len())?
        } else {
            series
        };
        let latest_bar = series.last().clone();
        let signals = self.strategy.compute(&series, &self.params)?;
        let latest_signal = signals.latest().cloned();

        if self.open.contains_key(symbol) {
            self.manage_open(symbol, &latest_bar, latest_signal.as_ref())
                .await
        } else {
            self.maybe_enter(symbol, &latest_bar, latest_signal.as_ref())
                .await
        }
    }

    /// Re-evaluate an open position against the latest bar and signal.
    async fn manage_open(
        &mut self,
        symbol: &str,
        bar: &Bar,
        signal: Option<&Signal>,
    ) -> Result<()> {
        let position = self.open.get(symbol).expect("checked by caller");
        let is_long = position.side == PositionSide::Long;

        let stop_hit = position.stop.is_some_and(|s| {
            if is_long { bar.low <= s } else { bar.high >= s }
        });
        let target_hit = position.target.is_some_and(|t| {
            if is_long { bar.high >= t } else { bar.low <= t }
        });

        if stop_hit {
            let price = position.stop.unwrap();
            return self.close(symbol, bar, price, ExitReason::StopLoss).await;
        }
        if target_hit {
            let price = position.target.unwrap();
            return self.close(symbol, bar, price, ExitReason::TakeProfit).await;
        }
        match signal {
            Some(s) if s.action == SignalAction::Exit => {
                self.close(symbol, bar, bar.close, ExitReason::SignalExit).await
            }
            Some(s) if s.is_hold() && s.stop.is_some() => {
                // Trailing ratchet, mirroring the backtest engine
                let level = s.stop.unwrap();
                let position = self.open.get_mut(symbol).expect("checked above");
                let tightened = match (is_long, position.stop) {
                    (true, Some(current)) => level > current,
                    (false, Some(current)) => level < current,
                    (_, None) => true,
                };
                if tightened {
                    position.stop = Some(level);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Open a position on an entry signal, under the position cap.
    async fn maybe_enter(
        &mut self,
        symbol: &str,
        bar: &Bar,
        signal: Option<&Signal>,
    ) -> Result<()> {
        let Some(signal) = signal.filter(|s| s.is_entry()) else {
            return Ok(());
        };
        if self.open.len() >= self.config.max_positions {
            tracing::debug!(symbol = %symbol, "entry skipped: position cap reached");
            return Ok(());
        }

        let price = signal.price;
        if price <= 0.0 {
            return Ok(());
        }
        let mut quantity = (self.config.capital_per_trade.min(self.cash)) / price;
        if !self.config.fractional_shares {
            quantity = quantity.floor();
        }
        if quantity < if self.config.fractional_shares { 1e-9 } else { 1.0 } {
            tracing::debug!(symbol = %symbol, "entry skipped: insufficient cash");
            return Ok(());
        }

        let side = if signal.action == SignalAction::EnterLong {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        let position = PaperPosition {
            id: format!("{symbol}-{}", bar.timestamp.timestamp()),
            symbol: symbol.to_string(),
            side,
            quantity,
            entry_time: bar.timestamp,
            entry_price: price,
            stop: signal.stop,
            target: signal.target,
        };

        self.store.open_position(&position).await?;
        self.cash -= position.entry_value();
        tracing::info!(
            symbol = %symbol,
            side = %position.side,
            quantity,
            price,
            "paper position opened"
        );
        self.open.insert(symbol.to_string(), position);
        Ok(())
    }

    /// Close an open position, persist the realized trade and update cash.
    async fn close(
        &mut self,
        symbol: &str,
        bar: &Bar,
        exit_price: f64,
        reason: ExitReason,
    ) -> Result<()> {
        let Some(position) = self.open.remove(symbol) else {
            return Ok(());
        };
        let pnl = position.unrealized_pnl(exit_price);
        let held = bar.timestamp - position.entry_time;
        let bar_secs = bar_span(self.config.timeframe).num_seconds().max(1);
        let trade = Trade {
            symbol: symbol.to_string(),
            side: position.side,
            quantity: position.quantity,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_time: bar.timestamp,
            exit_price,
            reason,
            pnl,
            pnl_pct: if position.entry_value() > 0.0 {
                pnl / position.entry_value() * 100.0
            } else {
                0.0
            },
            commission: 0.0,
            bars_held: (held.num_seconds() / bar_secs).max(0) as usize,
            days_held: held.num_seconds() as f64 / 86_400.0,
        };

        self.cash += position.entry_value() + pnl;
        let equity = self.equity();
        self.store.close_position(&position.id, &trade, equity).await?;
        tracing::info!(
            symbol = %symbol,
            reason = ?reason,
            pnl,
            equity,
            "paper position closed"
        );
        Ok(())
    }
}

/// Nominal calendar span of one bar.
fn bar_span(timeframe: Timeframe) -> Duration {
    match timeframe {
        Timeframe::M1 => Duration::minutes(1),
        Timeframe::M5 => Duration::minutes(5),
        Timeframe::M15 => Duration::minutes(15),
        Timeframe::H1 => Duration::hours(1),
        Timeframe::D1 => Duration::days(1),
    }
}

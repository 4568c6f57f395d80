//! Backtest execution engine.
//!
//! An event-loop simulator over one bar series and its aligned signal
//! series: evaluates intra-bar exits in a fixed priority order, sizes and
//! opens positions, marks the account to market after every bar and closes
//! any open position at the end of data.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::series::{Bar, BarSeries};
use crate::signal::{Signal, SignalAction, SignalSeries};
use crate::strategy::{Params, Strategy};

use super::config::BacktestConfig;
use super::position::{ExitReason, Position, PositionSide, Trade};
use super::result::{BacktestResult, EquityPoint, MetricsBlock};

/// Backtest execution engine.
///
/// # Example
///
/// ```
/// use b3_quant::backtest::{BacktestConfig, BacktestEngine};
/// use b3_quant::strategy::{Strategy, TrendFollowing};
/// use b3_quant::series::{Bar, BarSeries, Timeframe};
/// use chrono::{TimeZone, Utc};
///
/// let bars: Vec<Bar> = (0..200)
///     .map(|i| {
///         let c = 100.0 + i as f64;
///         Bar::new(
///             Utc.timestamp_opt(1_600_000_000 + i * 86_400, 0).unwrap(),
///             c, c, c, c, 1_000.0,
///         )
///     })
///     .collect();
/// let series = BarSeries::new("PETR4", Timeframe::D1, bars).unwrap();
///
/// let engine = BacktestEngine::new(BacktestConfig::default()).unwrap();
/// let strategy = TrendFollowing;
/// let result = engine.run(&strategy, &series, &strategy.default_params()).unwrap();
/// assert!(result.metrics.total_return >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    /// Create an engine after validating the configuration.
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Compute the strategy's signals and simulate them.
    pub fn run<S: Strategy + ?Sized>(
        &self,
        strategy: &S,
        bars: &BarSeries,
        params: &Params,
    ) -> Result<BacktestResult> {
        let signals = strategy.compute(bars, params)?;
        self.run_signals(strategy.name(), bars, &signals)
    }

    /// Simulate a pre-computed signal series.
    ///
    /// The series must be aligned to `bars`; a length mismatch is
    /// `InvalidInput`. Signal-level failures do not exist: the result always
    /// carries a (possibly empty) trade ledger.
    pub fn run_signals(
        &self,
        strategy_name: &str,
        bars: &BarSeries,
        signals: &SignalSeries,
    ) -> Result<BacktestResult> {
        if signals.len() != bars.len() {
            return Err(Error::invalid_input(
                "signals",
                format!(
                    "signal series length {} does not match bar series length {}",
                    signals.len(),
                    bars.len()
                ),
            ));
        }

        let n = bars.len();
        let start_index = signals.first_usable().min(n);
        let annualization = self
            .config
            .annualization_factor
            .unwrap_or_else(|| bars.timeframe().default_annualization());

        let mut cash = self.config.initial_capital;
        let mut position: Option<Position> = None;
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(n - start_index);

        for i in start_index..n {
            let bar = &bars.bars()[i];
            let signal = signals.get(i).expect("aligned series");

            // A bar touching both stop and target resolves as a stop
            let exit = position.as_ref().and_then(|pos| {
                let stop_hit = pos.stop.is_some_and(|s| {
                    if pos.is_long() { bar.low <= s } else { bar.high >= s }
                });
                let target_hit = pos.target.is_some_and(|t| {
                    if pos.is_long() { bar.high >= t } else { bar.low <= t }
                });
                if stop_hit {
                    Some((pos.stop.unwrap(), ExitReason::StopLoss))
                } else if target_hit {
                    Some((pos.target.unwrap(), ExitReason::TakeProfit))
                } else if signal.action == SignalAction::Exit {
                    let price = self.config.apply_exit_slippage(signal.price, pos.is_long());
                    Some((price, ExitReason::SignalExit))
                } else {
                    None
                }
            });
            if let Some((price, reason)) = exit {
                self.close_position(
                    &mut position,
                    &mut cash,
                    &mut trades,
                    bars.symbol(),
                    i,
                    bar.timestamp,
                    price,
                    reason,
                );
            } else if let Some(pos) = position.as_mut()
                && signal.is_hold()
                && let Some(level) = signal.stop
            {
                // Trailing ratchet: tighten only
                let tightened = match (pos.side, pos.stop) {
                    (PositionSide::Long, Some(current)) => level > current,
                    (PositionSide::Short, Some(current)) => level < current,
                    (_, None) => true,
                };
                if tightened {
                    pos.stop = Some(level);
                }
            }

            if position.is_none() && signal.is_entry() {
                self.open_position(&mut position, &mut cash, bar, i, signal);
            }

            let position_value = position
                .as_ref()
                .map(|p| p.market_value(bar.close))
                .unwrap_or(0.0);
            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                cash,
                position_value,
                total_equity: cash + position_value,
            });
        }

        // Whatever is still open goes out at the last close
        if position.is_some() {
            let last = bars.last();
            self.close_position(
                &mut position,
                &mut cash,
                &mut trades,
                bars.symbol(),
                n - 1,
                last.timestamp,
                last.close,
                ExitReason::EndOfData,
            );
            if let Some(point) = equity_curve.last_mut() {
                point.cash = cash;
                point.position_value = 0.0;
                point.total_equity = cash;
            }
        }

        let metrics = MetricsBlock::calculate(
            &trades,
            &equity_curve,
            self.config.initial_capital,
            annualization,
        );
        tracing::debug!(
            symbol = bars.symbol(),
            strategy = strategy_name,
            trades = trades.len(),
            total_return = metrics.total_return,
            "backtest complete"
        );

        let (start, end) = evaluated_range(&equity_curve, bars);
        Ok(BacktestResult {
            symbol: bars.symbol().to_string(),
            strategy_name: strategy_name.to_string(),
            config: self.config.clone(),
            start,
            end,
            initial_capital: self.config.initial_capital,
            metrics,
            trades,
            equity_curve,
        })
    }

    /// Size and open a position from an entry signal. Skips the entry when
    /// the computed quantity rounds to zero.
    fn open_position(
        &self,
        position: &mut Option<Position>,
        cash: &mut f64,
        bar: &Bar,
        index: usize,
        signal: &Signal,
    ) {
        let is_long = signal.action == SignalAction::EnterLong;
        let equity = *cash;
        let fill = self.config.apply_entry_slippage(signal.price, is_long);
        if fill <= 0.0 || !fill.is_finite() {
            return;
        }

        let max_notional = self.config.max_position_pct * equity;
        let mut quantity = match signal.stop {
            // Risk-based sizing off the stop distance
            Some(stop) if (fill - stop).abs() > f64::EPSILON => {
                let risk_fraction = signal.size_hint.unwrap_or(self.config.risk_per_trade);
                let risk_amount = risk_fraction * equity;
                (risk_amount / (fill - stop).abs()).min(max_notional / fill)
            }
            // Capital-fraction sizing when no stop is available
            _ => {
                let fraction = signal
                    .size_hint
                    .unwrap_or(self.config.max_position_pct)
                    .min(self.config.max_position_pct);
                fraction * equity / fill
            }
        };

        // Never spend more than the cash on hand, commission included
        let max_value = (*cash - self.config.commission) / (1.0 + self.config.commission_pct);
        quantity = quantity.min(max_value / fill).max(0.0);
        if !self.config.fractional_shares {
            quantity = quantity.floor();
        }
        let min_quantity = if self.config.fractional_shares { 1e-9 } else { 1.0 };
        if quantity < min_quantity {
            return;
        }

        let entry_value = quantity * fill;
        let commission = self.config.calculate_commission(entry_value);
        *cash -= entry_value + commission;
        *position = Some(Position {
            side: if is_long {
                PositionSide::Long
            } else {
                PositionSide::Short
            },
            entry_index: index,
            entry_time: bar.timestamp,
            entry_price: fill,
            quantity,
            stop: signal.stop,
            target: signal.target,
            entry_commission: commission,
            entry_signal: signal.clone(),
        });
    }

    /// Close the open position at `exit_price`, crediting cash and recording
    /// the trade.
    #[allow(clippy::too_many_arguments)]
    fn close_position(
        &self,
        position: &mut Option<Position>,
        cash: &mut f64,
        trades: &mut Vec<Trade>,
        symbol: &str,
        index: usize,
        time: DateTime<Utc>,
        exit_price: f64,
        reason: ExitReason,
    ) {
        let Some(pos) = position.take() else {
            return;
        };
        let exit_value = exit_price * pos.quantity;
        let commission = self.config.calculate_commission(exit_value);
        *cash += pos.entry_value() + pos.unrealized_pnl(exit_price) - commission;
        trades.push(pos.close(symbol, index, time, exit_price, commission, reason));
    }
}

fn evaluated_range(
    equity_curve: &[EquityPoint],
    bars: &BarSeries,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => (bars.first().timestamp, bars.last().timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Timeframe;
    use chrono::TimeZone;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + i * 86_400, 0).unwrap()
    }

    fn series(rows: &[(f64, f64, f64, f64)]) -> BarSeries {
        // (open, high, low, close)
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| Bar::new(ts(i as i64), o, h, l, c, 1_000.0))
            .collect();
        BarSeries::new("TEST", Timeframe::D1, bars).unwrap()
    }

    fn engine() -> BacktestEngine {
        BacktestEngine::new(BacktestConfig::default()).unwrap()
    }

    #[test]
    fn test_misaligned_signals_rejected() {
        let bars = series(&[(100.0, 101.0, 99.0, 100.0); 5]);
        let signals = SignalSeries::all_hold(4);
        assert!(engine().run_signals("test", &bars, &signals).is_err());
    }

    #[test]
    fn test_no_signals_empty_ledger_zero_return() {
        let bars = series(&[(100.0, 101.0, 99.0, 100.0); 10]);
        let mut signals = Vec::new();
        for i in 0..10 {
            signals.push(Signal::hold(i, 100.0));
        }
        let signals = SignalSeries::new(signals, 0).unwrap();
        let result = engine().run_signals("test", &bars, &signals).unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.metrics.total_return, 0.0);
        assert_eq!(result.metrics.final_capital, 100_000.0);
    }

    #[test]
    fn test_stop_beats_target_on_same_bar() {
        // Entry at 100 with stop 99 and target 105; the next bar spans both
        let bars = series(&[
            (100.0, 100.0, 100.0, 100.0),
            (101.0, 106.0, 98.0, 103.0),
        ]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_long(0, 100.0).with_stop(99.0).with_target(105.0),
                Signal::hold(1, 103.0),
            ],
            0,
        )
        .unwrap();

        let result = engine().run_signals("test", &bars, &signals).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, 99.0);
        // One currency unit lost per share
        assert!((trade.pnl - (-trade.quantity)).abs() < 1e-9);
    }

    #[test]
    fn test_target_fills_at_target_price() {
        let bars = series(&[
            (100.0, 100.0, 100.0, 100.0),
            (101.0, 106.0, 100.5, 103.0),
        ]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_long(0, 100.0).with_stop(95.0).with_target(105.0),
                Signal::hold(1, 103.0),
            ],
            0,
        )
        .unwrap();

        let result = engine().run_signals("test", &bars, &signals).unwrap();
        let trade = &result.trades[0];
        assert_eq!(trade.reason, ExitReason::TakeProfit);
        assert_eq!(trade.exit_price, 105.0);
    }

    #[test]
    fn test_end_of_data_closes_open_position() {
        let bars = series(&[
            (100.0, 100.0, 100.0, 100.0),
            (101.0, 102.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 104.0),
        ]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_long(0, 100.0),
                Signal::hold(1, 102.0),
                Signal::hold(2, 104.0),
            ],
            0,
        )
        .unwrap();

        let result = engine().run_signals("test", &bars, &signals).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.reason, ExitReason::EndOfData);
        assert_eq!(trade.exit_price, 104.0);
        assert!(trade.pnl > 0.0);
    }

    #[test]
    fn test_equity_identity_and_pnl_sum() {
        let bars = series(&[
            (100.0, 100.0, 100.0, 100.0),
            (101.0, 103.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 104.0),
            (104.0, 104.0, 96.0, 97.0),
            (97.0, 99.0, 96.0, 98.0),
        ]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_long(0, 100.0),
                Signal::hold(1, 102.0),
                Signal::exit(2, 104.0),
                Signal::enter_long(3, 97.0),
                Signal::hold(4, 98.0),
            ],
            0,
        )
        .unwrap();
        let config = BacktestConfig::builder()
            .commission_pct(0.001)
            .slippage_pct(0.0)
            .build()
            .unwrap();
        let engine = BacktestEngine::new(config).unwrap();
        let result = engine.run_signals("test", &bars, &signals).unwrap();

        // total_equity == cash + position_mtm at every bar
        for point in &result.equity_curve {
            assert!(
                (point.total_equity - (point.cash + point.position_value)).abs() < 1e-9
            );
        }
        // final equity == initial + sum of net trade pnl
        let pnl_sum: f64 = result.trades.iter().map(|t| t.pnl).sum();
        let final_equity = result.equity_curve.last().unwrap().total_equity;
        assert!(
            ((final_equity - (100_000.0 + pnl_sum)) / 100_000.0).abs() < 1e-6,
            "final {final_equity} vs initial + pnl {}",
            100_000.0 + pnl_sum
        );
    }

    #[test]
    fn test_risk_based_sizing() {
        // Stop 2.0 below fill: risk 2% of 100k = 2000 -> 1000 shares, but
        // notional cap 100k / 100 = 1000 shares; cash cap also 1000
        let bars = series(&[(100.0, 100.0, 100.0, 100.0), (100.0, 101.0, 99.5, 100.0)]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_long(0, 100.0).with_stop(98.0),
                Signal::hold(1, 100.0),
            ],
            0,
        )
        .unwrap();
        let result = engine().run_signals("test", &bars, &signals).unwrap();
        let trade = &result.trades[0];
        // risk_amount / distance = 2000 / 2 = 1000 shares
        assert_eq!(trade.quantity, 1_000.0);
    }

    #[test]
    fn test_size_hint_scales_risk() {
        let bars = series(&[(100.0, 100.0, 100.0, 100.0), (100.0, 101.0, 99.5, 100.0)]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_long(0, 100.0).with_stop(90.0).with_size_hint(0.01),
                Signal::hold(1, 100.0),
            ],
            0,
        )
        .unwrap();
        let result = engine().run_signals("test", &bars, &signals).unwrap();
        // 1% of 100k = 1000 at risk over a 10-point stop distance -> 100 shares
        assert_eq!(result.trades[0].quantity, 100.0);
    }

    #[test]
    fn test_trailing_ratchet_moves_stop_up_only() {
        let bars = series(&[
            (100.0, 100.0, 100.0, 100.0),
            (101.0, 103.0, 100.5, 102.0),
            (102.0, 104.0, 101.5, 103.0),
            (103.0, 103.5, 101.0, 101.5),
        ]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_long(0, 100.0).with_stop(95.0),
                Signal::hold(1, 102.0).with_stop(100.0), // raise
                Signal::hold(2, 103.0).with_stop(98.0),  // attempt to lower: ignored
                Signal::hold(3, 101.5),                  // low 101 > 100: no exit
            ],
            0,
        )
        .unwrap();
        let result = engine().run_signals("test", &bars, &signals).unwrap();
        // Position survives to end of data because the lower ratchet was refused
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].reason, ExitReason::EndOfData);
    }

    #[test]
    fn test_trailing_stop_hit_at_ratcheted_level() {
        let bars = series(&[
            (100.0, 100.0, 100.0, 100.0),
            (101.0, 103.0, 100.5, 102.0),
            (102.0, 102.5, 99.0, 99.5),
        ]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_long(0, 100.0).with_stop(95.0),
                Signal::hold(1, 102.0).with_stop(100.0),
                Signal::hold(2, 99.5),
            ],
            0,
        )
        .unwrap();
        let result = engine().run_signals("test", &bars, &signals).unwrap();
        let trade = &result.trades[0];
        assert_eq!(trade.reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, 100.0, "exit at the ratcheted level");
    }

    #[test]
    fn test_short_position_flow() {
        let bars = series(&[
            (100.0, 100.0, 100.0, 100.0),
            (99.0, 99.5, 97.0, 97.5),
            (97.0, 98.0, 95.0, 95.5),
        ]);
        let signals = SignalSeries::new(
            vec![
                Signal::enter_short(0, 100.0).with_stop(103.0),
                Signal::hold(1, 97.5),
                Signal::exit(2, 95.5),
            ],
            0,
        )
        .unwrap();
        let result = engine().run_signals("test", &bars, &signals).unwrap();
        let trade = &result.trades[0];
        assert_eq!(trade.side, PositionSide::Short);
        assert_eq!(trade.reason, ExitReason::SignalExit);
        assert!(trade.pnl > 0.0, "short profits from the decline");
    }

    #[test]
    fn test_deterministic_runs() {
        let rows: Vec<(f64, f64, f64, f64)> = (0..50)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                (c, c + 1.0, c - 1.0, c)
            })
            .collect();
        let bars = series(&rows);
        let strategy = crate::strategy::MeanReversion;
        let params = strategy.default_params();
        let a = engine().run(&strategy, &bars, &params).unwrap();
        let b = engine().run(&strategy, &bars, &params).unwrap();
        assert_eq!(a.trades, b.trades);
        assert_eq!(a.metrics, b.metrics);
    }
}

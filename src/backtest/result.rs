//! Backtest results, performance metrics and the JSON report projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::BacktestConfig;
use super::position::Trade;

/// Account snapshot appended after each evaluated bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// Bar timestamp
    pub timestamp: DateTime<Utc>,
    /// Free cash
    pub cash: f64,
    /// Mark-to-market value of the open position (zero when flat)
    pub position_value: f64,
    /// `cash + position_value`
    pub total_equity: f64,
}

/// Aggregate metrics over one backtest run.
///
/// Fields are `None` when undefined: Sharpe with zero variance, win rate
/// without trades, profit factor without wins or losses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBlock {
    /// Final equity minus initial capital, in currency
    pub total_return: f64,
    /// `total_return / initial_capital` (fraction)
    pub total_return_pct: f64,
    /// Annualized Sharpe ratio of bar-to-bar equity returns
    pub sharpe_ratio: Option<f64>,
    /// Deepest peak-to-trough equity decline, in currency
    pub max_drawdown: f64,
    /// Deepest relative decline `(peak - trough) / peak` (fraction)
    pub max_drawdown_pct: f64,
    /// Winning trades as a percentage of all trades (0-100)
    pub win_rate: Option<f64>,
    /// Number of closed trades
    pub total_trades: usize,
    /// Gross profit over gross loss; 999.99 when wins exist without losses
    pub profit_factor: Option<f64>,
    /// Mean percent return of winning trades
    pub avg_win_pct: Option<f64>,
    /// Mean percent return of losing trades
    pub avg_loss_pct: Option<f64>,
    /// Equity at the end of the run
    pub final_capital: f64,
}

/// Sentinel reported for profit factor when there are wins and no losses.
/// Preserved for output compatibility; consumers should treat "no losses"
/// as a distinguished case rather than a very large number.
pub const PROFIT_FACTOR_NO_LOSSES: f64 = 999.99;

impl MetricsBlock {
    /// Compute the metrics block from a trade ledger and equity curve.
    ///
    /// `annualization_factor` is the bars-per-year figure used to scale the
    /// Sharpe ratio.
    pub fn calculate(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        annualization_factor: f64,
    ) -> Self {
        let final_capital = equity_curve
            .last()
            .map(|p| p.total_equity)
            .unwrap_or(initial_capital);
        let total_return = final_capital - initial_capital;
        let total_return_pct = total_return / initial_capital;

        let (max_drawdown, max_drawdown_pct) = drawdowns(equity_curve);
        let sharpe_ratio = sharpe(equity_curve, annualization_factor);

        let wins: Vec<&Trade> = trades.iter().filter(|t| t.is_win()).collect();
        let losses: Vec<&Trade> = trades.iter().filter(|t| t.is_loss()).collect();

        let win_rate = (!trades.is_empty())
            .then(|| wins.len() as f64 / trades.len() as f64 * 100.0);

        let gross_profit: f64 = wins.iter().map(|t| t.pnl).sum();
        let gross_loss: f64 = losses.iter().map(|t| t.pnl.abs()).sum();
        let profit_factor = if gross_loss > 0.0 {
            Some(gross_profit / gross_loss)
        } else if gross_profit > 0.0 {
            Some(PROFIT_FACTOR_NO_LOSSES)
        } else {
            None
        };

        let avg_win_pct = (!wins.is_empty())
            .then(|| wins.iter().map(|t| t.pnl_pct).sum::<f64>() / wins.len() as f64);
        let avg_loss_pct = (!losses.is_empty())
            .then(|| losses.iter().map(|t| t.pnl_pct).sum::<f64>() / losses.len() as f64);

        Self {
            total_return,
            total_return_pct,
            sharpe_ratio,
            max_drawdown,
            max_drawdown_pct,
            win_rate,
            total_trades: trades.len(),
            profit_factor,
            avg_win_pct,
            avg_loss_pct,
            final_capital,
        }
    }
}

/// Maximum drawdown in currency and as a fraction of the running peak.
/// The two maxima are tracked independently.
fn drawdowns(equity_curve: &[EquityPoint]) -> (f64, f64) {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0f64;
    let mut max_dd_pct = 0.0f64;
    for point in equity_curve {
        if point.total_equity > peak {
            peak = point.total_equity;
        }
        let dd = peak - point.total_equity;
        max_dd = max_dd.max(dd);
        if peak > 0.0 {
            max_dd_pct = max_dd_pct.max(dd / peak);
        }
    }
    (max_dd, max_dd_pct)
}

/// Annualized Sharpe ratio over bar-to-bar equity returns. `None` with
/// fewer than 2 returns or zero standard deviation.
fn sharpe(equity_curve: &[EquityPoint], annualization_factor: f64) -> Option<f64> {
    if equity_curve.len() < 3 {
        return None;
    }
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].total_equity;
            if prev > 0.0 {
                (w[1].total_equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    // Sample variance (n-1)
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev == 0.0 || !std_dev.is_finite() {
        return None;
    }
    Some(mean / std_dev * annualization_factor.sqrt())
}

/// Complete result of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Symbol that was simulated
    pub symbol: String,
    /// Strategy label
    pub strategy_name: String,
    /// Configuration used
    pub config: BacktestConfig,
    /// First evaluated bar timestamp
    pub start: DateTime<Utc>,
    /// Last evaluated bar timestamp
    pub end: DateTime<Utc>,
    /// Starting cash
    pub initial_capital: f64,
    /// Aggregate metrics
    pub metrics: MetricsBlock,
    /// Closed trades in chronological order
    pub trades: Vec<Trade>,
    /// Account snapshot per evaluated bar
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestResult {
    /// Project into the serialization surface consumed by HTTP handlers.
    pub fn to_report(&self) -> BacktestReport {
        BacktestReport {
            symbol: self.symbol.clone(),
            strategy: self.strategy_name.clone(),
            period: ReportPeriod {
                start: self.start,
                end: self.end,
            },
            metrics: self.metrics.clone(),
            equity_curve: self
                .equity_curve
                .iter()
                .map(|p| EquityTick {
                    time: p.timestamp,
                    equity: p.total_equity,
                })
                .collect(),
            trades: self.trades.clone(),
        }
    }
}

/// Start/end pair for report periods (RFC-3339 in JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPeriod {
    /// Period start
    pub start: DateTime<Utc>,
    /// Period end
    pub end: DateTime<Utc>,
}

/// Slim equity curve entry for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityTick {
    /// Bar timestamp
    pub time: DateTime<Utc>,
    /// Total equity at that bar
    pub equity: f64,
}

/// JSON projection of a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Symbol that was simulated
    pub symbol: String,
    /// Strategy label
    pub strategy: String,
    /// Evaluated period
    pub period: ReportPeriod,
    /// Aggregate metrics (`null` for undefined fields)
    pub metrics: MetricsBlock,
    /// Equity per bar
    pub equity_curve: Vec<EquityTick>,
    /// Closed trades
    pub trades: Vec<Trade>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::position::{ExitReason, PositionSide};
    use chrono::TimeZone;

    fn point(i: i64, equity: f64) -> EquityPoint {
        EquityPoint {
            timestamp: Utc.timestamp_opt(1_600_000_000 + i * 86_400, 0).unwrap(),
            cash: equity,
            position_value: 0.0,
            total_equity: equity,
        }
    }

    fn trade(pnl: f64, pnl_pct: f64) -> Trade {
        Trade {
            symbol: "TEST".into(),
            side: PositionSide::Long,
            quantity: 10.0,
            entry_time: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            entry_price: 100.0,
            exit_time: Utc.timestamp_opt(1_600_086_400, 0).unwrap(),
            exit_price: 100.0 + pnl / 10.0,
            reason: ExitReason::SignalExit,
            pnl,
            pnl_pct,
            commission: 0.0,
            bars_held: 1,
            days_held: 1.0,
        }
    }

    #[test]
    fn test_no_trades_all_null() {
        let curve = vec![point(0, 100_000.0), point(1, 100_000.0)];
        let m = MetricsBlock::calculate(&[], &curve, 100_000.0, 252.0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.total_trades, 0);
        assert!(m.win_rate.is_none());
        assert!(m.profit_factor.is_none());
        assert!(m.avg_win_pct.is_none());
    }

    #[test]
    fn test_flat_equity_sharpe_is_null() {
        let curve: Vec<EquityPoint> = (0..10).map(|i| point(i, 100_000.0)).collect();
        let m = MetricsBlock::calculate(&[], &curve, 100_000.0, 252.0);
        assert!(m.sharpe_ratio.is_none());
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.max_drawdown_pct, 0.0);
    }

    #[test]
    fn test_drawdown_currency_and_pct() {
        let curve = vec![
            point(0, 100_000.0),
            point(1, 110_000.0),
            point(2, 99_000.0),
            point(3, 120_000.0),
        ];
        let m = MetricsBlock::calculate(&[], &curve, 100_000.0, 252.0);
        assert!((m.max_drawdown - 11_000.0).abs() < 1e-6);
        assert!((m.max_drawdown_pct - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_profit_factor_sentinel() {
        let trades = vec![trade(100.0, 10.0), trade(50.0, 5.0)];
        let curve = vec![point(0, 100_000.0), point(1, 100_150.0)];
        let m = MetricsBlock::calculate(&trades, &curve, 100_000.0, 252.0);
        assert_eq!(m.profit_factor, Some(PROFIT_FACTOR_NO_LOSSES));
        assert_eq!(m.win_rate, Some(100.0));
        assert!(m.avg_loss_pct.is_none());
    }

    #[test]
    fn test_profit_factor_ratio() {
        let trades = vec![trade(100.0, 10.0), trade(-50.0, -5.0)];
        let curve = vec![point(0, 100_000.0), point(1, 100_050.0)];
        let m = MetricsBlock::calculate(&trades, &curve, 100_000.0, 252.0);
        assert_eq!(m.profit_factor, Some(2.0));
        assert_eq!(m.win_rate, Some(50.0));
        assert_eq!(m.avg_win_pct, Some(10.0));
        assert_eq!(m.avg_loss_pct, Some(-5.0));
    }

    #[test]
    fn test_rising_equity_sharpe_defined() {
        let curve: Vec<EquityPoint> = (0..20)
            .map(|i| point(i, 100_000.0 + (i * i) as f64 * 10.0))
            .collect();
        let m = MetricsBlock::calculate(&[], &curve, 100_000.0, 252.0);
        assert!(m.sharpe_ratio.unwrap() > 0.0);
    }

    #[test]
    fn test_metrics_null_fields_serialize_as_json_null() {
        let curve = vec![point(0, 100_000.0), point(1, 100_000.0)];
        let m = MetricsBlock::calculate(&[], &curve, 100_000.0, 252.0);
        let json = serde_json::to_value(&m).unwrap();
        assert!(json["sharpe_ratio"].is_null());
        assert!(json["win_rate"].is_null());
        assert!(json["profit_factor"].is_null());
    }
}

//! Walk-forward result and report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backtest::MetricsBlock;
use crate::strategy::Params;

use super::window::SkippedWindow;

/// Calendar extent and bar count of one slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeMeta {
    /// First bar timestamp in the slice
    pub start: DateTime<Utc>,
    /// Last bar timestamp in the slice
    pub end: DateTime<Utc>,
    /// Number of bars
    pub size: usize,
}

/// Train/test extents of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPeriod {
    /// In-sample slice
    pub train: RangeMeta,
    /// Out-of-sample slice
    pub test: RangeMeta,
}

/// Outcome of one walk-forward window.
///
/// `best_params` is `None` when every trial in the window failed; the
/// metric blocks are `None` in the same case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    /// Window number in generation order
    pub window_id: usize,
    /// Train/test extents
    pub period: WindowPeriod,
    /// Parameters selected on the train slice
    pub best_params: Option<Params>,
    /// Backtest metrics of the best parameters on the train slice
    pub train_metrics: Option<MetricsBlock>,
    /// Backtest metrics of the same parameters on the test slice
    pub test_metrics: Option<MetricsBlock>,
    /// Number of optimisation trials run for this window
    pub optimization_trials: usize,
}

/// Aggregate statistics over all window test slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Number of completed windows
    pub total_windows: usize,
    /// Mean test-slice total return (currency)
    pub avg_test_return: Option<f64>,
    /// Sample standard deviation of test-slice total returns
    pub std_test_return: Option<f64>,
    /// Mean test-slice Sharpe ratio (over windows where it is defined)
    pub avg_test_sharpe: Option<f64>,
    /// Sample standard deviation of test-slice Sharpe ratios
    pub std_test_sharpe: Option<f64>,
    /// Total trades across all test slices
    pub total_test_trades: usize,
    /// Windows with positive test return
    pub positive_windows: usize,
    /// Windows with negative test return
    pub negative_windows: usize,
}

impl AggregateStats {
    /// Aggregate the test-slice metrics of completed windows.
    pub(crate) fn from_windows(windows: &[WindowResult]) -> Self {
        let returns: Vec<f64> = windows
            .iter()
            .filter_map(|w| w.test_metrics.as_ref().map(|m| m.total_return))
            .collect();
        let sharpes: Vec<f64> = windows
            .iter()
            .filter_map(|w| w.test_metrics.as_ref().and_then(|m| m.sharpe_ratio))
            .collect();
        let total_test_trades = windows
            .iter()
            .filter_map(|w| w.test_metrics.as_ref().map(|m| m.total_trades))
            .sum();

        Self {
            total_windows: windows.len(),
            avg_test_return: mean(&returns),
            std_test_return: std_dev(&returns),
            avg_test_sharpe: mean(&sharpes),
            std_test_sharpe: std_dev(&sharpes),
            total_test_trades,
            positive_windows: returns.iter().filter(|r| **r > 0.0).count(),
            negative_windows: returns.iter().filter(|r| **r < 0.0).count(),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Full walk-forward report: the JSON projection handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    /// Strategy name
    pub strategy: String,
    /// Configuration the run used
    pub configuration: super::WalkForwardConfig,
    /// Aggregate statistics over completed windows
    pub aggregate_statistics: AggregateStats,
    /// Per-window results
    pub windows: Vec<WindowResult>,
    /// Windows dropped before optimisation, with reasons
    pub skipped_windows: Vec<SkippedWindow>,
    /// True when the run was cut short by cancellation or the run timeout
    pub cancelled: bool,
}

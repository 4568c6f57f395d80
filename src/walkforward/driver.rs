//! The walk-forward driver: window loop, trial loop, penalties, parallelism.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backtest::{BacktestConfig, BacktestEngine, MetricsBlock};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::series::BarSeries;
use crate::strategy::{Params, Strategy};

use super::report::{AggregateStats, RangeMeta, WalkForwardReport, WindowPeriod, WindowResult};
use super::sampler::{RandomSampler, Sampler, TpeSampler};
use super::window::generate_windows;

/// Which metric the in-sample search maximises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeMetric {
    /// Annualized Sharpe ratio
    SharpeRatio,
    /// Total return in currency
    TotalReturn,
    /// Gross profit over gross loss
    ProfitFactor,
}

impl OptimizeMetric {
    /// Extract the raw objective from a metrics block. `None` when the
    /// metric is undefined for the run.
    fn raw_score(&self, metrics: &MetricsBlock) -> Option<f64> {
        match self {
            Self::SharpeRatio => metrics.sharpe_ratio,
            Self::TotalReturn => Some(metrics.total_return),
            Self::ProfitFactor => metrics.profit_factor,
        }
    }
}

/// Which built-in sampler drives the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    /// Tree-structured Parzen estimator (default)
    Tpe,
    /// Uniform random search (baseline, tests)
    Random,
}

/// Walk-forward run configuration.
///
/// Build with [`WalkForwardConfig::new`], adjust with the builder methods,
/// then call [`run`](WalkForwardConfig::run).
///
/// # Example
///
/// ```no_run
/// use b3_quant::backtest::BacktestConfig;
/// use b3_quant::walkforward::{OptimizeMetric, WalkForwardConfig};
///
/// let config = WalkForwardConfig::new(252, 63)
///     .metric(OptimizeMetric::SharpeRatio)
///     .n_trials(50)
///     .seed(7)
///     .backtest(BacktestConfig::default());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Train window length in calendar days
    pub train_window_days: i64,
    /// Test window length in calendar days
    pub test_window_days: i64,
    /// Rolling step in calendar days; `None` anchors the train start
    pub step_days: Option<i64>,
    /// Objective maximised on each train slice
    pub optimization_metric: OptimizeMetric,
    /// Trials per window
    pub n_trials: usize,
    /// Minimum bars beyond the warm-up a train slice must hold
    pub min_bars_for_stats: usize,
    /// Sampler seed; windows derive their own sub-seeds from it
    pub seed: u64,
    /// Parallel trial evaluations per batch; 0 uses the rayon thread count.
    /// Reproducibility across runs requires the same worker count; full
    /// sequential determinism requires 1.
    pub workers: usize,
    /// Which built-in sampler to use
    pub sampler: SamplerKind,
    /// Per-trial wall-clock limit in seconds; exceeding trials score worst
    pub trial_timeout_secs: Option<f64>,
    /// Whole-run wall-clock limit in seconds; the run stops between trial
    /// batches and the partial report is marked cancelled
    pub run_timeout_secs: Option<f64>,
    /// Backtest configuration applied to every train and test run
    pub backtest: BacktestConfig,
}

impl WalkForwardConfig {
    /// Create a configuration with the given window lengths and defaults:
    /// anchored windows, Sharpe objective, 50 trials, TPE sampler, seed 0,
    /// worker count taken from the rayon pool. Pin `workers` to 1 for
    /// fully sequential, bit-reproducible runs.
    pub fn new(train_window_days: i64, test_window_days: i64) -> Self {
        Self {
            train_window_days,
            test_window_days,
            step_days: None,
            optimization_metric: OptimizeMetric::SharpeRatio,
            n_trials: 50,
            min_bars_for_stats: 30,
            seed: 0,
            workers: 0,
            sampler: SamplerKind::Tpe,
            trial_timeout_secs: None,
            run_timeout_secs: None,
            backtest: BacktestConfig::default(),
        }
    }

    /// Roll the windows forward by `days` instead of anchoring.
    pub fn step_days(mut self, days: i64) -> Self {
        self.step_days = Some(days);
        self
    }

    /// Set the optimisation objective.
    pub fn metric(mut self, metric: OptimizeMetric) -> Self {
        self.optimization_metric = metric;
        self
    }

    /// Set the number of trials per window.
    pub fn n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Set the sampler seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the parallel batch width (0 = rayon thread count).
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Choose the built-in sampler.
    pub fn sampler(mut self, kind: SamplerKind) -> Self {
        self.sampler = kind;
        self
    }

    /// Set the per-trial wall-clock limit.
    pub fn trial_timeout_secs(mut self, secs: f64) -> Self {
        self.trial_timeout_secs = Some(secs);
        self
    }

    /// Set the whole-run wall-clock limit.
    pub fn run_timeout_secs(mut self, secs: f64) -> Self {
        self.run_timeout_secs = Some(secs);
        self
    }

    /// Set the backtest configuration used for every slice.
    pub fn backtest(mut self, config: BacktestConfig) -> Self {
        self.backtest = config;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.train_window_days <= 0 {
            return Err(Error::invalid_input("train_window_days", "must be positive"));
        }
        if self.test_window_days <= 0 {
            return Err(Error::invalid_input("test_window_days", "must be positive"));
        }
        if let Some(step) = self.step_days
            && step <= 0
        {
            return Err(Error::invalid_input("step_days", "must be positive when set"));
        }
        if self.n_trials == 0 {
            return Err(Error::invalid_input("n_trials", "must be at least 1"));
        }
        self.backtest.validate()
    }

    /// Run the walk-forward optimisation.
    pub fn run<S: Strategy>(&self, strategy: &S, bars: &BarSeries) -> Result<WalkForwardReport> {
        self.run_cancellable(strategy, bars, &CancelToken::new())
    }

    /// Run with an external cancellation token.
    pub fn run_cancellable<S: Strategy>(
        &self,
        strategy: &S,
        bars: &BarSeries,
        cancel: &CancelToken,
    ) -> Result<WalkForwardReport> {
        let kind = self.sampler;
        self.run_with_sampler(strategy, bars, cancel, &|seed| match kind {
            SamplerKind::Tpe => Box::new(TpeSampler::new(seed)),
            SamplerKind::Random => Box::new(RandomSampler::new(seed)),
        })
    }

    /// Run with a caller-supplied sampler factory.
    ///
    /// The factory receives a per-window seed derived from
    /// [`seed`](Self::seed); this is the swap point for custom search
    /// algorithms.
    pub fn run_with_sampler<S: Strategy>(
        &self,
        strategy: &S,
        bars: &BarSeries,
        cancel: &CancelToken,
        make_sampler: &dyn Fn(u64) -> Box<dyn Sampler>,
    ) -> Result<WalkForwardReport> {
        self.validate()?;

        let defaults = strategy.default_params();
        let min_train_bars = strategy.warm_up(&defaults) + self.min_bars_for_stats;
        let (windows, skipped) = generate_windows(
            bars,
            self.train_window_days,
            self.test_window_days,
            self.step_days,
            min_train_bars,
        );
        if windows.is_empty() && skipped.is_empty() {
            return Err(Error::insufficient_data(min_train_bars, bars.len()));
        }

        let engine = BacktestEngine::new(self.backtest.clone())?;
        let space = strategy.search_space();
        let workers = if self.workers == 0 {
            rayon::current_num_threads().max(1)
        } else {
            self.workers
        };
        let run_start = Instant::now();
        let run_limit = self.run_timeout_secs.map(Duration::from_secs_f64);
        let trial_limit = self.trial_timeout_secs.map(Duration::from_secs_f64);

        let mut results: Vec<WindowResult> = Vec::with_capacity(windows.len());
        let mut cancelled = false;

        'windows: for window in &windows {
            if cancel.is_cancelled() || exceeded(run_start, run_limit) {
                cancelled = true;
                break;
            }

            let train_bars = bars.slice(window.train.start, window.train.end)?;
            let test_bars = bars.slice(window.test.start, window.test.end)?;
            let mut sampler = make_sampler(window_seed(self.seed, window.id));

            // Objective for one parameter point on the train slice. Sampled
            // points cover the search space only; defaults fill the rest.
            let evaluate = |params: &Params| -> Option<f64> {
                if cancel.is_cancelled() {
                    return None;
                }
                let started = Instant::now();
                let full = materialize(&defaults, params);
                let score = self.score_trial(strategy, &engine, &train_bars, &full);
                if exceeded(started, trial_limit) {
                    tracing::warn!(window = window.id, "trial exceeded wall-clock limit");
                    return None;
                }
                score
            };

            let mut done = 0;
            while done < self.n_trials {
                if cancel.is_cancelled() || exceeded(run_start, run_limit) {
                    cancelled = true;
                    break 'windows;
                }
                let batch = workers.min(self.n_trials - done);
                let proposals: Vec<Params> =
                    (0..batch).map(|_| sampler.suggest(&space)).collect();
                let scores: Vec<Option<f64>> = if batch == 1 {
                    vec![evaluate(&proposals[0])]
                } else {
                    proposals.par_iter().map(&evaluate).collect()
                };
                // Observe in proposal order: the (propose, observe) sequence
                // stays well-defined under parallel evaluation
                for (params, score) in proposals.iter().zip(&scores) {
                    sampler.observe(params, *score);
                }
                done += batch;
            }

            let period = WindowPeriod {
                train: range_meta(&train_bars),
                test: range_meta(&test_bars),
            };
            let result = match sampler.best() {
                Some((best_params, _)) => {
                    let best_params = materialize(&defaults, best_params);
                    let train_metrics = engine
                        .run(strategy, &train_bars, &best_params)
                        .map(|r| r.metrics)
                        .ok();
                    let test_metrics = engine
                        .run(strategy, &test_bars, &best_params)
                        .map(|r| r.metrics)
                        .ok();
                    WindowResult {
                        window_id: window.id,
                        period,
                        best_params: Some(best_params),
                        train_metrics,
                        test_metrics,
                        optimization_trials: done,
                    }
                }
                // Every trial failed: record the window with nulls
                None => WindowResult {
                    window_id: window.id,
                    period,
                    best_params: None,
                    train_metrics: None,
                    test_metrics: None,
                    optimization_trials: done,
                },
            };
            tracing::debug!(
                window = window.id,
                trials = result.optimization_trials,
                has_best = result.best_params.is_some(),
                "walk-forward window complete"
            );
            results.push(result);
        }

        Ok(WalkForwardReport {
            strategy: strategy.name().to_string(),
            configuration: self.clone(),
            aggregate_statistics: AggregateStats::from_windows(&results),
            windows: results,
            skipped_windows: skipped,
            cancelled,
        })
    }

    /// Evaluate one trial and apply the score penalties.
    fn score_trial<S: Strategy>(
        &self,
        strategy: &S,
        engine: &BacktestEngine,
        train_bars: &BarSeries,
        params: &Params,
    ) -> Option<f64> {
        // Constraint violations are worst-score outcomes, not errors
        if strategy.validate(params).is_err() {
            return None;
        }
        let signals = strategy.compute(train_bars, params).ok()?;
        let result = engine
            .run_signals(strategy.name(), train_bars, &signals)
            .ok()?;
        let metrics = &result.metrics;

        if metrics.total_trades == 0 {
            return None;
        }
        let raw = self.optimization_metric.raw_score(metrics)?;
        if !raw.is_finite() {
            return None;
        }
        // Deep drawdowns halve the score
        if metrics.max_drawdown_pct > 0.30 {
            return Some(raw * 0.5);
        }
        Some(raw)
    }
}

fn exceeded(since: Instant, limit: Option<Duration>) -> bool {
    limit.is_some_and(|l| since.elapsed() > l)
}

/// Overlay a sampled point on the strategy defaults, yielding the full
/// parameter set `compute` expects.
fn materialize(defaults: &Params, sampled: &Params) -> Params {
    let mut full = defaults.clone();
    for (name, value) in sampled {
        full.insert(name.clone(), value.clone());
    }
    full
}

/// Mix the run seed with the window id so each window gets an independent
/// but reproducible sampler stream.
fn window_seed(seed: u64, window_id: usize) -> u64 {
    seed ^ (window_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn range_meta(bars: &BarSeries) -> RangeMeta {
    RangeMeta {
        start: bars.first().timestamp,
        end: bars.last().timestamp,
        size: bars.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{Bar, Timeframe};
    use crate::strategy::MeanReversion;
    use chrono::{TimeZone, Utc};

    fn sine_series(n: usize) -> BarSeries {
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + 5.0 * (2.0 * std::f64::consts::PI * i as f64 / 20.0).sin();
                Bar::new(
                    Utc.timestamp_opt(1_600_000_000 + i as i64 * 86_400, 0).unwrap(),
                    c,
                    c + 0.5,
                    c - 0.5,
                    c,
                    1_000.0,
                )
            })
            .collect();
        BarSeries::new("TEST", Timeframe::D1, bars).unwrap()
    }

    fn quick_config() -> WalkForwardConfig {
        WalkForwardConfig::new(100, 50)
            .metric(OptimizeMetric::TotalReturn)
            .n_trials(16)
            .sampler(SamplerKind::Random)
            .seed(11)
    }

    #[test]
    fn test_run_produces_windows() {
        let bars = sine_series(400);
        let report = quick_config().run(&MeanReversion, &bars).unwrap();

        assert!(!report.windows.is_empty());
        assert!(!report.cancelled);
        assert_eq!(
            report.aggregate_statistics.total_windows,
            report.windows.len()
        );
        for w in &report.windows {
            assert_eq!(w.optimization_trials, 16);
            // Test slice starts where the train slice ends
            assert!(w.period.train.end < w.period.test.start);
        }
        // The oscillating series gives mean reversion plenty to trade: at
        // least some windows must find a scoring parameter set
        assert!(
            report.windows.iter().any(|w| w.best_params.is_some()),
            "no window produced a best parameter set"
        );
    }

    #[test]
    fn test_insufficient_data_errors() {
        let bars = sine_series(50);
        let err = quick_config().run(&MeanReversion, &bars);
        assert!(err.is_err());
    }

    #[test]
    fn test_seeded_sequential_runs_are_identical() {
        let bars = sine_series(400);
        let config = quick_config().workers(1);
        let a = config.run(&MeanReversion, &bars).unwrap();
        let b = config.run(&MeanReversion, &bars).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cancellation_yields_partial_report() {
        let bars = sine_series(400);
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = quick_config()
            .run_cancellable(&MeanReversion, &bars, &cancel)
            .unwrap();
        assert!(report.cancelled);
        assert!(report.windows.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bars = sine_series(400);
        let config = WalkForwardConfig::new(0, 50);
        assert!(config.run(&MeanReversion, &bars).is_err());
        let config = WalkForwardConfig::new(100, 50).n_trials(0);
        assert!(config.run(&MeanReversion, &bars).is_err());
    }

    #[test]
    fn test_window_seed_varies() {
        assert_ne!(window_seed(1, 0), window_seed(1, 1));
        assert_eq!(window_seed(1, 3), window_seed(1, 3));
    }
}

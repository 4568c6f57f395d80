//! Backtest run configuration and builder.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for backtest execution.
///
/// Use [`BacktestConfig::builder`] to construct with the builder pattern.
///
/// # Example
///
/// ```
/// use b3_quant::backtest::BacktestConfig;
///
/// let config = BacktestConfig::builder()
///     .initial_capital(250_000.0)
///     .risk_per_trade(0.01)
///     .commission_pct(0.0005)
///     .slippage_pct(0.0002)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting cash in base currency
    pub initial_capital: f64,

    /// Fraction of equity at risk per trade when the entry signal carries a
    /// stop price (risk-based sizing)
    pub risk_per_trade: f64,

    /// Cap on position notional as a fraction of equity
    pub max_position_pct: f64,

    /// Maximum concurrent positions. The per-symbol engine holds at most
    /// one open position; the cap binds portfolio contexts such as the
    /// paper runner.
    pub max_concurrent_positions: usize,

    /// Flat commission per side
    pub commission: f64,

    /// Commission as a fraction of trade value (0.0 - 1.0)
    pub commission_pct: f64,

    /// Slippage as a fraction of price applied to entry and signal-exit
    /// fills (0.0 - 1.0). Stop and target fills execute at their level.
    pub slippage_pct: f64,

    /// Allow fractional share quantities. When `false` (the default for
    /// equities) quantities are floored to whole shares.
    pub fractional_shares: bool,

    /// Bars per year for Sharpe annualization. `None` falls back to the
    /// bar series' timeframe default.
    pub annualization_factor: Option<f64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            risk_per_trade: 0.02,
            max_position_pct: 1.0,
            max_concurrent_positions: 1,
            commission: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            fractional_shares: false,
            annualization_factor: None,
        }
    }
}

impl BacktestConfig {
    /// Create a new builder.
    pub fn builder() -> BacktestConfigBuilder {
        BacktestConfigBuilder::default()
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capital <= 0.0 || !self.initial_capital.is_finite() {
            return Err(Error::invalid_input("initial_capital", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.risk_per_trade) || self.risk_per_trade == 0.0 {
            return Err(Error::invalid_input(
                "risk_per_trade",
                "must be in (0.0, 1.0]",
            ));
        }
        if self.max_position_pct <= 0.0 || self.max_position_pct > 1.0 {
            return Err(Error::invalid_input(
                "max_position_pct",
                "must be in (0.0, 1.0]",
            ));
        }
        if self.max_concurrent_positions == 0 {
            return Err(Error::invalid_input(
                "max_concurrent_positions",
                "must be at least 1",
            ));
        }
        if self.commission < 0.0 {
            return Err(Error::invalid_input("commission", "cannot be negative"));
        }
        if !(0.0..=1.0).contains(&self.commission_pct) {
            return Err(Error::invalid_input(
                "commission_pct",
                "must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.slippage_pct) {
            return Err(Error::invalid_input(
                "slippage_pct",
                "must be between 0.0 and 1.0",
            ));
        }
        if let Some(factor) = self.annualization_factor
            && factor <= 0.0
        {
            return Err(Error::invalid_input(
                "annualization_factor",
                "must be positive (e.g. 252 for daily bars)",
            ));
        }
        Ok(())
    }

    /// Commission for a trade of the given notional value.
    pub fn calculate_commission(&self, trade_value: f64) -> f64 {
        self.commission + trade_value * self.commission_pct
    }

    /// Entry fill price with slippage against the taker.
    pub fn apply_entry_slippage(&self, price: f64, is_long: bool) -> f64 {
        if is_long {
            price * (1.0 + self.slippage_pct)
        } else {
            price * (1.0 - self.slippage_pct)
        }
    }

    /// Exit fill price with slippage against the taker.
    pub fn apply_exit_slippage(&self, price: f64, is_long: bool) -> f64 {
        if is_long {
            price * (1.0 - self.slippage_pct)
        } else {
            price * (1.0 + self.slippage_pct)
        }
    }
}

/// Builder for [`BacktestConfig`].
#[derive(Debug, Default)]
pub struct BacktestConfigBuilder {
    config: BacktestConfig,
}

impl BacktestConfigBuilder {
    /// Set starting cash.
    pub fn initial_capital(mut self, capital: f64) -> Self {
        self.config.initial_capital = capital;
        self
    }

    /// Set the fraction of equity risked per trade.
    pub fn risk_per_trade(mut self, fraction: f64) -> Self {
        self.config.risk_per_trade = fraction;
        self
    }

    /// Set the notional cap as a fraction of equity.
    pub fn max_position_pct(mut self, fraction: f64) -> Self {
        self.config.max_position_pct = fraction;
        self
    }

    /// Set the concurrent position cap.
    pub fn max_concurrent_positions(mut self, max: usize) -> Self {
        self.config.max_concurrent_positions = max;
        self
    }

    /// Set the flat commission per side.
    pub fn commission(mut self, fee: f64) -> Self {
        self.config.commission = fee;
        self
    }

    /// Set the proportional commission per side.
    pub fn commission_pct(mut self, pct: f64) -> Self {
        self.config.commission_pct = pct;
        self
    }

    /// Set proportional slippage.
    pub fn slippage_pct(mut self, pct: f64) -> Self {
        self.config.slippage_pct = pct;
        self
    }

    /// Allow fractional share quantities.
    pub fn fractional_shares(mut self, allow: bool) -> Self {
        self.config.fractional_shares = allow;
        self
    }

    /// Override the Sharpe annualization factor.
    pub fn annualization_factor(mut self, bars_per_year: f64) -> Self {
        self.config.annualization_factor = Some(bars_per_year);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<BacktestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

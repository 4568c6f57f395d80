//! OHLCV bars and the immutable bar series they form.
//!
//! A [`BarSeries`] is the atomic input to every other component: indicators,
//! strategies, the backtest engine and the walk-forward optimiser all consume
//! it read-only. Slices share the underlying buffer, so handing sub-ranges to
//! a walk-forward window is cheap.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar timestamp (UTC, start of the interval)
    pub timestamp: DateTime<Utc>,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Traded volume (shares/contracts)
    pub volume: f64,
    /// Traded notional in currency, when the venue reports it
    pub volume_notional: Option<f64>,
}

impl Bar {
    /// Convenience constructor without notional volume.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            volume_notional: None,
        }
    }

    /// True when `low <= min(open, close) <= max(open, close) <= high`.
    ///
    /// The series constructor tolerates violations but flags them; see
    /// [`BarSeries::ohlc_violations`].
    pub fn is_ohlc_consistent(&self) -> bool {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        self.low <= body_low && body_high <= self.high
    }
}

/// Bar cadence tag. The core is agnostic to the value beyond choosing a
/// default Sharpe annualization factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// One-minute bars
    #[serde(rename = "1m")]
    M1,
    /// Five-minute bars
    #[serde(rename = "5m")]
    M5,
    /// Fifteen-minute bars
    #[serde(rename = "15m")]
    M15,
    /// Hourly bars
    #[serde(rename = "1h")]
    H1,
    /// Daily bars
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Canonical tag string (`"1m"`, `"5m"`, `"15m"`, `"1h"`, `"1d"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::D1 => "1d",
        }
    }

    /// Default annualization factor (bars per year) for Sharpe-style ratios,
    /// assuming a 6.5-hour session and 252 sessions per year.
    ///
    /// This is a documented convenience, not a contract: bar cadence cannot
    /// be inferred safely from timestamps alone, so callers with irregular
    /// calendars should pass their own factor.
    pub fn default_annualization(&self) -> f64 {
        match self {
            Self::D1 => 252.0,
            Self::H1 => 252.0 * 6.5,
            Self::M15 => 252.0 * 6.5 * 4.0,
            Self::M5 => 252.0 * 6.5 * 12.0,
            Self::M1 => 252.0 * 6.5 * 60.0,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(Self::M1),
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "1h" => Ok(Self::H1),
            "1d" => Ok(Self::D1),
            other => Err(Error::invalid_input(
                "timeframe",
                format!("unknown tag '{other}'"),
            )),
        }
    }
}

/// An immutable, strictly time-ordered sequence of bars for one symbol.
///
/// Construction validates ordering and price sanity once; afterwards the
/// series is a shared value. [`slice`](Self::slice) and
/// [`slice_time`](Self::slice_time) return views over the same buffer.
#[derive(Debug, Clone)]
pub struct BarSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Arc<[Bar]>,
    start: usize,
    end: usize,
}

impl BarSeries {
    /// Build a series from an ordered list of bars.
    ///
    /// Rejects empty input, non-strictly-increasing timestamps, non-finite
    /// or non-positive prices and negative volume. OHLC range violations
    /// (`low > min(open, close)` etc.) are tolerated but logged; use
    /// [`ohlc_violations`](Self::ohlc_violations) to inspect them.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(Error::invalid_input("bars", "series must not be empty"));
        }

        for (i, bar) in bars.iter().enumerate() {
            for (name, value) in [
                ("open", bar.open),
                ("high", bar.high),
                ("low", bar.low),
                ("close", bar.close),
            ] {
                if !value.is_finite() || value <= 0.0 {
                    return Err(Error::invalid_input(
                        name,
                        format!("bar {i} has non-positive or non-finite {name} ({value})"),
                    ));
                }
            }
            if !bar.volume.is_finite() || bar.volume < 0.0 {
                return Err(Error::invalid_input(
                    "volume",
                    format!("bar {i} has negative or non-finite volume ({})", bar.volume),
                ));
            }
            if i > 0 && bars[i - 1].timestamp >= bar.timestamp {
                return Err(Error::invalid_input(
                    "timestamp",
                    format!("bar {i} is not strictly after bar {}", i - 1),
                ));
            }
        }

        let violations = bars.iter().filter(|b| !b.is_ohlc_consistent()).count();
        if violations > 0 {
            tracing::warn!(symbol = %symbol, violations, "bar series has OHLC range violations");
        }

        let end = bars.len();
        Ok(Self {
            symbol,
            timeframe,
            bars: bars.into(),
            start: 0,
            end,
        })
    }

    /// Symbol tag.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Timeframe tag.
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Number of bars in this view.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always `false`: construction rejects empty series, and slicing
    /// rejects empty ranges.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bars of this view.
    pub fn bars(&self) -> &[Bar] {
        &self.bars[self.start..self.end]
    }

    /// Bar at index `i`, if in range.
    pub fn get(&self, i: usize) -> Option<&Bar> {
        self.bars().get(i)
    }

    /// First bar of the view.
    pub fn first(&self) -> &Bar {
        &self.bars()[0]
    }

    /// Last bar of the view.
    pub fn last(&self) -> &Bar {
        &self.bars()[self.len() - 1]
    }

    /// Sub-series over the half-open index range `[start, end)`.
    ///
    /// Shares the underlying buffer with `self`.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.len() {
            return Err(Error::invalid_input(
                "range",
                format!("[{start}, {end}) out of bounds for series of length {}", self.len()),
            ));
        }
        Ok(Self {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            bars: Arc::clone(&self.bars),
            start: self.start + start,
            end: self.start + end,
        })
    }

    /// Sub-series over the inclusive time range `[from, to]`.
    pub fn slice_time(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        let start = self.index_at_or_after(from);
        let end = self.bars().partition_point(|b| b.timestamp <= to);
        self.slice(start, end)
    }

    /// Index of the first bar whose timestamp is at or after `t`
    /// (`len()` when every bar is earlier). Binary search.
    pub fn index_at_or_after(&self, t: DateTime<Utc>) -> usize {
        self.bars().partition_point(|b| b.timestamp < t)
    }

    /// Close prices as a column vector.
    pub fn closes(&self) -> Vec<f64> {
        self.bars().iter().map(|b| b.close).collect()
    }

    /// High prices as a column vector.
    pub fn highs(&self) -> Vec<f64> {
        self.bars().iter().map(|b| b.high).collect()
    }

    /// Low prices as a column vector.
    pub fn lows(&self) -> Vec<f64> {
        self.bars().iter().map(|b| b.low).collect()
    }

    /// Volumes as a column vector.
    pub fn volumes(&self) -> Vec<f64> {
        self.bars().iter().map(|b| b.volume).collect()
    }

    /// Indices of bars whose OHLC ranges are inconsistent.
    pub fn ohlc_violations(&self) -> Vec<usize> {
        self.bars()
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_ohlc_consistent())
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + i * 86_400, 0).unwrap()
    }

    fn flat_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar::new(ts(i as i64), 100.0, 101.0, 99.0, 100.0, 1_000.0))
            .collect()
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(BarSeries::new("PETR4", Timeframe::D1, vec![]).is_err());
    }

    #[test]
    fn test_new_rejects_unordered_timestamps() {
        let mut bars = flat_bars(3);
        bars[2].timestamp = bars[0].timestamp;
        assert!(BarSeries::new("PETR4", Timeframe::D1, bars).is_err());
    }

    #[test]
    fn test_new_rejects_negative_price() {
        let mut bars = flat_bars(3);
        bars[1].close = -5.0;
        assert!(BarSeries::new("PETR4", Timeframe::D1, bars).is_err());
    }

    #[test]
    fn test_new_tolerates_ohlc_violation() {
        let mut bars = flat_bars(3);
        bars[1].high = 99.5; // below both open and close
        let series = BarSeries::new("PETR4", Timeframe::D1, bars).unwrap();
        assert_eq!(series.ohlc_violations(), vec![1]);
    }

    #[test]
    fn test_slice_shares_buffer() {
        let series = BarSeries::new("VALE3", Timeframe::D1, flat_bars(10)).unwrap();
        let sub = series.slice(2, 7).unwrap();
        assert_eq!(sub.len(), 5);
        assert_eq!(sub.first().timestamp, ts(2));
        assert_eq!(sub.last().timestamp, ts(6));

        // Slicing a slice keeps indices relative to the view
        let subsub = sub.slice(1, 3).unwrap();
        assert_eq!(subsub.first().timestamp, ts(3));
    }

    #[test]
    fn test_slice_rejects_empty_or_oob() {
        let series = BarSeries::new("VALE3", Timeframe::D1, flat_bars(5)).unwrap();
        assert!(series.slice(3, 3).is_err());
        assert!(series.slice(0, 6).is_err());
    }

    #[test]
    fn test_slice_time_inclusive_bounds() {
        let series = BarSeries::new("ITUB4", Timeframe::D1, flat_bars(10)).unwrap();
        let sub = series.slice_time(ts(2), ts(5)).unwrap();
        assert_eq!(sub.len(), 4);
        assert_eq!(sub.first().timestamp, ts(2));
        assert_eq!(sub.last().timestamp, ts(5));
    }

    #[test]
    fn test_index_at_or_after() {
        let series = BarSeries::new("ITUB4", Timeframe::D1, flat_bars(5)).unwrap();
        assert_eq!(series.index_at_or_after(ts(0)), 0);
        assert_eq!(series.index_at_or_after(ts(3)), 3);
        assert_eq!(series.index_at_or_after(ts(99)), 5);
    }

    #[test]
    fn test_timeframe_round_trip() {
        for tag in ["1m", "5m", "15m", "1h", "1d"] {
            let tf: Timeframe = tag.parse().unwrap();
            assert_eq!(tf.as_str(), tag);
        }
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_default_annualization() {
        assert_eq!(Timeframe::D1.default_annualization(), 252.0);
        assert_eq!(Timeframe::H1.default_annualization(), 1638.0);
    }
}

//! Synthetic bar series shared by the integration tests.
#![allow(dead_code)]

use b3_quant::series::{Bar, BarSeries, Timeframe};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_650_000_000, 0).unwrap()
}

/// Daily bars with O=H=L=C and constant volume.
pub fn monotone_daily(n: usize) -> BarSeries {
    let bars = (0..n)
        .map(|i| {
            let c = 100.0 + i as f64;
            Bar::new(t0() + Duration::days(i as i64), c, c, c, c, 1_000.0)
        })
        .collect();
    BarSeries::new("PETR4", Timeframe::D1, bars).unwrap()
}

/// Daily bars following `100 + 5 sin(2 pi i / 20)` with a symmetric range.
pub fn sine_daily(n: usize) -> BarSeries {
    let bars = (0..n)
        .map(|i| {
            let c = 100.0 + 5.0 * (2.0 * std::f64::consts::PI * i as f64 / 20.0).sin();
            Bar::new(
                t0() + Duration::days(i as i64),
                c,
                c + 0.5,
                c - 0.5,
                c,
                1_000.0,
            )
        })
        .collect();
    BarSeries::new("VALE3", Timeframe::D1, bars).unwrap()
}

/// Perfectly flat daily bars.
pub fn flat_daily(n: usize) -> BarSeries {
    let bars = (0..n)
        .map(|i| Bar::new(t0() + Duration::days(i as i64), 100.0, 100.0, 100.0, 100.0, 1_000.0))
        .collect();
    BarSeries::new("ITUB4", Timeframe::D1, bars).unwrap()
}

/// Hourly bars from explicit closes with a +-0.4 range.
pub fn hourly_from_closes(symbol: &str, closes: &[f64]) -> BarSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::new(
                t0() + Duration::hours(i as i64),
                c,
                c + 0.4,
                c - 0.4,
                c,
                5_000.0,
            )
        })
        .collect();
    BarSeries::new(symbol, Timeframe::H1, bars).unwrap()
}

/// A gently rising daily context whose close stays near its own EMAs.
pub fn uptrend_context_daily(n: usize) -> BarSeries {
    let bars = (0..n)
        .map(|i| {
            let c = 100.0 * 1.001f64.powi(i as i32);
            Bar::new(
                t0() + Duration::days(i as i64) - Duration::days(n as i64),
                c,
                c * 1.005,
                c * 0.995,
                c,
                10_000.0,
            )
        })
        .collect();
    BarSeries::new("WAVE", Timeframe::D1, bars).unwrap()
}

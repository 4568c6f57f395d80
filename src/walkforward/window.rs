//! Calendar windowing for walk-forward validation.
//!
//! Windows are generated on the calendar axis (days from the first bar)
//! and mapped to bar index ranges by binary search. Every boundary uses the
//! same at-or-after rule, so a train range's end index is literally its test
//! range's start index and rolling test ranges are disjoint.

use chrono::Duration;

use crate::series::{BarSeries, Timeframe};

/// A (train, test) pair of half-open bar index ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Sequential window number (skipped windows keep their number)
    pub id: usize,
    /// Train slice `[start, end)`
    pub train: std::ops::Range<usize>,
    /// Test slice `[start, end)`; `test.start == train.end`
    pub test: std::ops::Range<usize>,
}

/// A window dropped before optimisation, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SkippedWindow {
    /// Window number in generation order
    pub window_id: usize,
    /// Why it was dropped
    pub reason: String,
}

/// Nominal duration of one bar, used to place the exclusive end of the data
/// on the calendar axis.
fn bar_duration(timeframe: Timeframe) -> Duration {
    match timeframe {
        Timeframe::M1 => Duration::minutes(1),
        Timeframe::M5 => Duration::minutes(5),
        Timeframe::M15 => Duration::minutes(15),
        Timeframe::H1 => Duration::hours(1),
        Timeframe::D1 => Duration::days(1),
    }
}

/// Generate (train, test) windows over `bars`.
///
/// `step_days = None` anchors the train start at the first bar and grows the
/// train range by one test length per window; a positive step rolls both
/// ends forward. Windows whose train slice holds fewer than
/// `min_train_bars` bars, or whose test slice is empty, are recorded as
/// skipped and do not stop iteration.
pub fn generate_windows(
    bars: &BarSeries,
    train_days: i64,
    test_days: i64,
    step_days: Option<i64>,
    min_train_bars: usize,
) -> (Vec<Window>, Vec<SkippedWindow>) {
    let t0 = bars.first().timestamp;
    let data_end = bars.last().timestamp + bar_duration(bars.timeframe());
    let train_len = Duration::days(train_days);
    let test_len = Duration::days(test_days);

    let mut windows = Vec::new();
    let mut skipped = Vec::new();

    for k in 0.. {
        let (train_start_t, train_end_t) = match step_days {
            // Anchored: the train range grows by one test length per window
            None => (t0, t0 + train_len + test_len * (k as i32)),
            // Rolling: both ends advance by the step
            Some(step) => {
                let start = t0 + Duration::days(step * k as i64);
                (start, start + train_len)
            }
        };
        let test_end_t = train_end_t + test_len;
        if test_end_t > data_end {
            break;
        }

        let train_start = bars.index_at_or_after(train_start_t);
        let boundary = bars.index_at_or_after(train_end_t);
        let test_end = bars.index_at_or_after(test_end_t);

        let train = train_start..boundary;
        let test = boundary..test_end;

        if train.len() < min_train_bars {
            tracing::warn!(
                window = k,
                train_bars = train.len(),
                min_train_bars,
                "skipping walk-forward window: train slice too short"
            );
            skipped.push(SkippedWindow {
                window_id: k,
                reason: format!(
                    "train slice has {} bars, need at least {min_train_bars}",
                    train.len()
                ),
            });
            continue;
        }
        if test.is_empty() {
            tracing::warn!(window = k, "skipping walk-forward window: empty test slice");
            skipped.push(SkippedWindow {
                window_id: k,
                reason: "test slice holds no bars".to_string(),
            });
            continue;
        }

        windows.push(Window { id: k, train, test });
    }

    (windows, skipped)
}

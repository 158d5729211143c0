//! Statistics shared by the metric calculators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: f64 = 86400.0;

/// Value at percentile `p` (0–100) of ascending `sorted_data`, linearly interpolated
/// between the two nearest ranks.
///
/// Returns 0 for empty input and the sole element for single-element input.
#[must_use]
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    match sorted_data {
        [] => 0.0,
        [only] => *only,
        _ => {
            let last = sorted_data.len() - 1;

            #[expect(clippy::cast_precision_loss, reason = "index fits in f64 mantissa")]
            let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;

            #[expect(clippy::cast_possible_truncation, reason = "rank is within [0, len - 1]")]
            #[expect(clippy::cast_sign_loss, reason = "rank is non-negative")]
            let lower = rank.floor() as usize;
            let upper = (lower + 1).min(last);

            #[expect(clippy::cast_precision_loss, reason = "index fits in f64 mantissa")]
            let fraction = rank - lower as f64;

            sorted_data[lower] + (sorted_data[upper] - sorted_data[lower]) * fraction
        }
    }
}

/// Round to two decimals so artifacts stay readable.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to four decimals, for ratios.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `numerator / denominator`, or 0 when there is nothing to divide by.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "acceptable for ratios")]
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round4(numerator as f64 / denominator as f64)
    }
}

#[must_use]
#[expect(clippy::cast_precision_loss, reason = "acceptable for durations")]
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_HOUR
}

#[must_use]
#[expect(clippy::cast_precision_loss, reason = "acceptable for durations")]
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

/// Count an iterator's items as `u64`.
#[must_use]
pub fn count<I: IntoIterator>(items: I) -> u64 {
    items.into_iter().fold(0, |n, _| n + 1)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Summary {
    avg: f64,
    median: f64,
    p90: f64,
    p95: f64,
    count: u64,
}

/// Summarize durations, ignoring negative and non-finite values.
#[expect(clippy::cast_precision_loss, reason = "acceptable for statistics")]
fn summarize(values: impl IntoIterator<Item = f64>) -> Summary {
    let mut values: Vec<f64> = values.into_iter().filter(|v| v.is_finite() && *v >= 0.0).collect();

    if values.is_empty() {
        return Summary::default();
    }

    values.sort_by(f64::total_cmp);

    Summary {
        avg: round2(values.iter().sum::<f64>() / values.len() as f64),
        median: round2(percentile(&values, 50.0)),
        p90: round2(percentile(&values, 90.0)),
        p95: round2(percentile(&values, 95.0)),
        count: values.len() as u64,
    }
}

/// Distribution of durations measured in hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourStats {
    pub avg_hours: f64,
    pub median_hours: f64,
    pub p90_hours: f64,
    pub p95_hours: f64,
    pub count: u64,
}

impl HourStats {
    #[must_use]
    pub fn from_hours(hours: impl IntoIterator<Item = f64>) -> Self {
        let s = summarize(hours);
        Self {
            avg_hours: s.avg,
            median_hours: s.median,
            p90_hours: s.p90,
            p95_hours: s.p95,
            count: s.count,
        }
    }
}

/// Distribution of durations measured in days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayStats {
    pub avg_days: f64,
    pub median_days: f64,
    pub p90_days: f64,
    pub p95_days: f64,
    pub count: u64,
}

impl DayStats {
    #[must_use]
    pub fn from_days(days: impl IntoIterator<Item = f64>) -> Self {
        let s = summarize(days);
        Self {
            avg_days: s.avg,
            median_days: s.median,
            p90_days: s.p90,
            p95_days: s.p95,
            count: s.count,
        }
    }
}

/// Events inside trailing 7, 30 and 90 day windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub last_7_days: u64,
    pub last_30_days: u64,
    pub last_90_days: u64,
}

impl WindowCounts {
    /// Count `ts` into every window it falls in; a window of `d` days contains `ts`
    /// when `now - d <= ts`.
    pub fn record(&mut self, ts: DateTime<Utc>, now: DateTime<Utc>) {
        if ts >= now - chrono::Duration::days(90) {
            self.last_90_days += 1;
            if ts >= now - chrono::Duration::days(30) {
                self.last_30_days += 1;
                if ts >= now - chrono::Duration::days(7) {
                    self.last_7_days += 1;
                }
            }
        }
    }

    #[must_use]
    pub fn from_timestamps(timestamps: impl IntoIterator<Item = DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let mut counts = Self::default();
        for ts in timestamps {
            counts.record(ts, now);
        }
        counts
    }
}

/// Open items not updated for more than 30, 60 and 90 days. The counts overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleCounts {
    pub over_30_days: u64,
    pub over_60_days: u64,
    pub over_90_days: u64,
}

impl StaleCounts {
    #[must_use]
    pub fn from_last_updated(updated: impl IntoIterator<Item = DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let mut counts = Self::default();
        for ts in updated {
            let idle = now - ts;
            if idle > chrono::Duration::days(30) {
                counts.over_30_days += 1;
            }
            if idle > chrono::Duration::days(60) {
                counts.over_60_days += 1;
            }
            if idle > chrono::Duration::days(90) {
                counts.over_90_days += 1;
            }
        }
        counts
    }
}

/// An open item still waiting for a maintainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingItem {
    pub number: u64,
    pub title: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub days_waiting: u64,
}

/// Open items without a maintainer response, bucketed by how long they have waited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Waiting {
    pub over_24_hours: u64,
    pub over_7_days: u64,
    pub over_30_days: u64,

    /// Oldest first.
    pub items: Vec<WaitingItem>,
}

impl Waiting {
    #[must_use]
    pub fn from_items(mut items: Vec<WaitingItem>, now: DateTime<Utc>) -> Self {
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.number.cmp(&b.number)));

        let mut waiting = Self::default();
        for item in &items {
            let age = now - item.created_at;
            if age > chrono::Duration::hours(24) {
                waiting.over_24_hours += 1;
            }
            if age > chrono::Duration::days(7) {
                waiting.over_7_days += 1;
            }
            if age > chrono::Duration::days(30) {
                waiting.over_30_days += 1;
            }
        }

        waiting.items = items;
        waiting
    }
}

/// Whole days between `from` and `now`, never negative.
#[must_use]
pub fn whole_days(from: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - from).num_days()).unwrap_or(0)
}

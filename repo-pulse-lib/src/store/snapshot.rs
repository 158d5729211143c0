//! Dated snapshot records and the monthly fold.

use crate::metrics::RepoMetrics;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Daily,
    Monthly,
}

/// One history record: a day, or a month folded from its days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub repository: String,

    /// `YYYY-MM-DD` for daily records, `YYYY-MM` for monthly ones.
    pub period: String,
    pub kind: SnapshotKind,

    /// Number of daily records represented; the weight used when folding.
    pub days: u64,

    /// Dates of the daily records folded into a monthly record. A daily whose date is
    /// listed here is already accounted for and must not be weighted in again.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub folded: BTreeSet<NaiveDate>,
    pub generated_at: DateTime<Utc>,
    pub metrics: SnapshotMetrics,
}

impl Snapshot {
    #[must_use]
    pub fn daily(metrics: &RepoMetrics) -> Self {
        Self {
            repository: metrics.repository.clone(),
            period: metrics.generated_at.format("%Y-%m-%d").to_string(),
            kind: SnapshotKind::Daily,
            days: 1,
            folded: BTreeSet::new(),
            generated_at: metrics.generated_at,
            metrics: SnapshotMetrics::from(metrics),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    pub open: u64,
    pub opened_30d: u64,
    pub closed_30d: u64,
    pub without_response_24h: u64,
    pub without_response_7d: u64,
    pub without_response_30d: u64,
    pub unlabeled: u64,
    pub stale_90d: u64,
    pub median_response_hours: f64,
    pub median_days_to_close: f64,
    pub label_coverage: f64,
    pub reopen_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PullSnapshot {
    pub open: u64,
    pub opened_30d: u64,
    pub merged_30d: u64,
    pub closed_without_merge_30d: u64,
    pub without_review_7d: u64,
    pub stale_90d: u64,
    pub median_merge_hours: f64,
    pub median_review_hours: f64,
    pub review_rate: f64,
    pub rejection_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributorSnapshot {
    pub active_30d: u64,
    pub first_time: u64,
    pub retention_rate: f64,
    pub avg_weekly_commits: f64,
    pub total_known_contributors: u64,
}

/// The subset of [`RepoMetrics`] tracked over time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    pub repo: RepoSnapshot,
    pub issues: IssueSnapshot,
    pub pull_requests: PullSnapshot,
    pub contributors: ContributorSnapshot,
}

impl From<&RepoMetrics> for SnapshotMetrics {
    fn from(m: &RepoMetrics) -> Self {
        Self {
            repo: RepoSnapshot {
                stars: m.counters.stars,
                forks: m.counters.forks,
                watchers: m.counters.watchers,
            },
            issues: IssueSnapshot {
                open: m.issues.open,
                opened_30d: m.issues.opened.last_30_days,
                closed_30d: m.issues.closed.last_30_days,
                without_response_24h: m.issues.without_response_24h,
                without_response_7d: m.issues.without_response_7d,
                without_response_30d: m.issues.without_response_30d,
                unlabeled: m.issues.unlabeled,
                stale_90d: m.issues.stale.over_90_days,
                median_response_hours: m.issues.response_time.median_hours,
                median_days_to_close: m.issues.time_to_close.median_days,
                label_coverage: m.issues.label_coverage,
                reopen_rate: m.issues.reopen_rate,
            },
            pull_requests: PullSnapshot {
                open: m.pull_requests.open,
                opened_30d: m.pull_requests.opened.last_30_days,
                merged_30d: m.pull_requests.merged.last_30_days,
                closed_without_merge_30d: m.pull_requests.closed_without_merge.last_30_days,
                without_review_7d: m.pull_requests.without_review_7d,
                stale_90d: m.pull_requests.stale.over_90_days,
                median_merge_hours: m.pull_requests.merge_time.median_hours,
                median_review_hours: m.pull_requests.review_time.median_hours,
                review_rate: m.pull_requests.review_rate,
                rejection_rate: m.pull_requests.rejection_rate,
            },
            contributors: ContributorSnapshot {
                active_30d: m.contributors.active_30d,
                first_time: m.contributors.first_time,
                retention_rate: m.contributors.retention.rate,
                avg_weekly_commits: m.contributors.avg_weekly_commits,
                total_known_contributors: m.contributors.total_known_contributors,
            },
        }
    }
}

/// Weighted records being folded into one.
struct Fold<'a> {
    records: &'a [(SnapshotMetrics, u64)],
    total_weight: u64,
}

impl Fold<'_> {
    /// Weighted mean of a count, rounded to the nearest integer.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "counts and day weights are far below 2^52"
    )]
    fn count(&self, field: impl Fn(&SnapshotMetrics) -> u64) -> u64 {
        if self.total_weight == 0 {
            return 0;
        }
        let sum: u128 = self
            .records
            .iter()
            .map(|(m, weight)| u128::from(field(m)) * u128::from(*weight))
            .sum();
        (sum as f64 / self.total_weight as f64).round() as u64
    }

    /// Weighted mean of a rate or duration, rounded to four decimals.
    #[expect(clippy::cast_precision_loss, reason = "day weights are small")]
    fn rate(&self, field: impl Fn(&SnapshotMetrics) -> f64) -> f64 {
        if self.total_weight == 0 {
            return 0.0;
        }
        let sum: f64 = self.records.iter().map(|(m, weight)| field(m) * *weight as f64).sum();
        ((sum / self.total_weight as f64) * 10_000.0).round() / 10_000.0
    }

    /// Largest value seen, for cumulative figures.
    fn max(&self, field: impl Fn(&SnapshotMetrics) -> u64) -> u64 {
        self.records.iter().map(|(m, _)| field(m)).max().unwrap_or(0)
    }
}

/// Fold weighted records into one.
///
/// Each record carries the number of days it represents. Counts are averaged by weight
/// and rounded, rates and durations are averaged by weight, and cumulative figures
/// (stars, forks, known contributors) take their maximum.
#[must_use]
pub fn fold_snapshots(records: &[(SnapshotMetrics, u64)]) -> SnapshotMetrics {
    let f = Fold {
        records,
        total_weight: records.iter().map(|(_, weight)| weight).sum(),
    };

    SnapshotMetrics {
        repo: RepoSnapshot {
            stars: f.max(|m| m.repo.stars),
            forks: f.max(|m| m.repo.forks),
            watchers: f.count(|m| m.repo.watchers),
        },
        issues: IssueSnapshot {
            open: f.count(|m| m.issues.open),
            opened_30d: f.count(|m| m.issues.opened_30d),
            closed_30d: f.count(|m| m.issues.closed_30d),
            without_response_24h: f.count(|m| m.issues.without_response_24h),
            without_response_7d: f.count(|m| m.issues.without_response_7d),
            without_response_30d: f.count(|m| m.issues.without_response_30d),
            unlabeled: f.count(|m| m.issues.unlabeled),
            stale_90d: f.count(|m| m.issues.stale_90d),
            median_response_hours: f.rate(|m| m.issues.median_response_hours),
            median_days_to_close: f.rate(|m| m.issues.median_days_to_close),
            label_coverage: f.rate(|m| m.issues.label_coverage),
            reopen_rate: f.rate(|m| m.issues.reopen_rate),
        },
        pull_requests: PullSnapshot {
            open: f.count(|m| m.pull_requests.open),
            opened_30d: f.count(|m| m.pull_requests.opened_30d),
            merged_30d: f.count(|m| m.pull_requests.merged_30d),
            closed_without_merge_30d: f.count(|m| m.pull_requests.closed_without_merge_30d),
            without_review_7d: f.count(|m| m.pull_requests.without_review_7d),
            stale_90d: f.count(|m| m.pull_requests.stale_90d),
            median_merge_hours: f.rate(|m| m.pull_requests.median_merge_hours),
            median_review_hours: f.rate(|m| m.pull_requests.median_review_hours),
            review_rate: f.rate(|m| m.pull_requests.review_rate),
            rejection_rate: f.rate(|m| m.pull_requests.rejection_rate),
        },
        contributors: ContributorSnapshot {
            active_30d: f.count(|m| m.contributors.active_30d),
            first_time: f.count(|m| m.contributors.first_time),
            retention_rate: f.rate(|m| m.contributors.retention_rate),
            avg_weekly_commits: f.rate(|m| m.contributors.avg_weekly_commits),
            total_known_contributors: f.max(|m| m.contributors.total_known_contributors),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(open: u64, stars: u64, reopen_rate: f64) -> SnapshotMetrics {
        let mut m = SnapshotMetrics::default();
        m.issues.open = open;
        m.repo.stars = stars;
        m.issues.reopen_rate = reopen_rate;
        m
    }

    #[test]
    fn constant_counts_survive_folding() {
        let records: Vec<_> = (0..30).map(|_| (with(10, 5, 0.25), 1)).collect();

        let folded = fold_snapshots(&records);

        assert_eq!(folded.issues.open, 10);
        assert_eq!(folded.repo.stars, 5);
        assert!((folded.issues.reopen_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn counts_are_rounded_averages() {
        let folded = fold_snapshots(&[(with(1, 0, 0.0), 1), (with(2, 0, 0.0), 1)]);
        assert_eq!(folded.issues.open, 2);

        let folded = fold_snapshots(&[(with(1, 0, 0.0), 2), (with(2, 0, 0.0), 1)]);
        assert_eq!(folded.issues.open, 1);
    }

    #[test]
    fn cumulative_fields_take_the_maximum() {
        let mut late = with(0, 120, 0.0);
        late.contributors.total_known_contributors = 40;
        let mut early = with(0, 100, 0.0);
        early.contributors.total_known_contributors = 35;

        let folded = fold_snapshots(&[(early, 1), (late, 1)]);

        assert_eq!(folded.repo.stars, 120);
        assert_eq!(folded.contributors.total_known_contributors, 40);
    }

    #[test]
    fn existing_rollup_is_weighted_by_its_days() {
        let folded = fold_snapshots(&[(with(10, 0, 0.5), 20), (with(40, 0, 0.0), 10)]);

        assert_eq!(folded.issues.open, 20);
        assert!((folded.issues.reopen_rate - 0.3333).abs() < 1e-9);
    }

    #[test]
    fn empty_fold_is_zero() {
        assert_eq!(fold_snapshots(&[]), SnapshotMetrics::default());
    }
}

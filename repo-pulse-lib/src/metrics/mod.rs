//! Repository health metrics
//!
//! This module turns collected repository activity into health figures: how fast
//! maintainers respond to issues and pull requests, how much of the backlog has gone
//! stale, whether contributors keep coming back, and which files change the most.
//!
//! # Implementation Model
//!
//! Every calculator is a pure function of the collected entities, an
//! [`IdentityMatcher`](crate::identity::IdentityMatcher) and a reference time `now`.
//! Nothing reads the clock, so the same inputs always produce the same metrics.
//! Calculators never fail: empty inputs produce zero values.
//!
//! Durations are summarized with [`HourStats`] and [`DayStats`] (mean, median, p90, p95),
//! using linearly interpolated percentiles. Event volumes use trailing 7, 30 and 90 day
//! windows ([`WindowCounts`]).
//!
//! [`compute_repo_metrics`] runs all calculators and returns the contributor history
//! to persist for the next run alongside the [`RepoMetrics`].

mod contributor_metrics;
mod hotspots;
mod issue_metrics;
mod pull_metrics;
mod repo_metrics;
mod stats;

pub use contributor_metrics::{COMMIT_WEEKS, ContributorMetrics, ContributorOutcome, Retention, RetentionBasis, compute_contributor_metrics};
pub use hotspots::{DirectoryHotspot, FileHotspot, Hotspots, TOP_DIRECTORIES, TOP_FILES, compute_hotspots};
pub use issue_metrics::{IssueMetrics, compute_issue_metrics};
pub use pull_metrics::{PullMetrics, SizeBuckets, compute_pull_metrics};
pub use repo_metrics::{ContributorHistory, RepoMetrics, compute_repo_metrics};
pub use stats::{DayStats, HourStats, StaleCounts, WaitingItem, WindowCounts, percentile};

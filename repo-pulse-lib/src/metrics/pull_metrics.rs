use super::issue_metrics::first_maintainer_response;
use super::stats::{HourStats, StaleCounts, Waiting, WaitingItem, WindowCounts, count, hours_between, ratio, round2, whole_days};
use crate::facts::PullRequest;
use crate::identity::IdentityMatcher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pull requests smaller than this many changed lines are small.
const SMALL_PR_LINES: u64 = 100;

/// Pull requests smaller than this many changed lines (and not small) are medium.
const MEDIUM_PR_LINES: u64 = 500;

/// Span over which merge-related rates are computed.
const RATE_WINDOW_DAYS: i64 = 90;

/// Pull requests by additions plus deletions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBuckets {
    pub small: u64,
    pub medium: u64,
    pub large: u64,
}

impl SizeBuckets {
    pub const fn record(&mut self, lines: u64) {
        if lines < SMALL_PR_LINES {
            self.small += 1;
        } else if lines < MEDIUM_PR_LINES {
            self.medium += 1;
        } else {
            self.large += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullMetrics {
    pub open: u64,
    pub open_drafts: u64,
    pub opened: WindowCounts,
    pub merged: WindowCounts,
    pub closed_without_merge: WindowCounts,

    /// Creation to merge, for pull requests merged in the last 90 days.
    pub merge_time: HourStats,

    /// Creation to first maintainer review, non-draft pull requests only.
    pub review_time: HourStats,

    /// Creation to first maintainer review or comment, non-draft pull requests only.
    pub response_time: HourStats,

    pub without_review_24h: u64,
    pub without_review_7d: u64,
    pub without_review_30d: u64,

    /// Open non-draft pull requests no maintainer has reviewed or commented on, oldest first.
    pub without_review: Vec<WaitingItem>,

    pub size: SizeBuckets,

    /// Share of pull requests merged in the last 90 days that received at least one review.
    pub review_rate: f64,

    /// Closed-without-merge over all closed pull requests, last 90 days.
    pub rejection_rate: f64,

    pub avg_reviews_per_merged: f64,
    pub stale: StaleCounts,
}

fn waiting_item(pull: &PullRequest, now: DateTime<Utc>) -> WaitingItem {
    WaitingItem {
        number: pull.number,
        title: pull.title.clone(),
        author: pull.author.clone(),
        created_at: pull.created_at,
        days_waiting: whole_days(pull.created_at, now),
    }
}

/// Derive pull request health metrics from the open and recently closed pull requests.
#[must_use]
pub fn compute_pull_metrics(open: &[PullRequest], closed: &[PullRequest], identity: &IdentityMatcher, now: DateTime<Utc>) -> PullMetrics {
    let all = || open.iter().chain(closed);
    let window_start = now - chrono::Duration::days(RATE_WINDOW_DAYS);

    let merged_recently: Vec<&PullRequest> = closed.iter().filter(|p| p.merged_at.is_some_and(|t| t >= window_start)).collect();
    let rejected_recently = count(closed.iter().filter(|p| p.is_rejected() && p.closed_at.is_some_and(|t| t >= window_start)));

    let mut review_hours = Vec::new();
    let mut response_hours = Vec::new();
    let mut waiting = Vec::new();
    let mut size = SizeBuckets::default();

    for pull in all() {
        size.record(pull.size());

        if pull.is_draft {
            continue;
        }

        let author = pull.author.as_deref();
        let first_review = first_maintainer_response(&pull.reviews, author, identity);
        let first_response = first_maintainer_response(pull.reviews.iter().chain(&pull.comments), author, identity);

        if let Some(reviewed_at) = first_review {
            review_hours.push(hours_between(pull.created_at, reviewed_at));
        }

        match first_response {
            Some(responded_at) => response_hours.push(hours_between(pull.created_at, responded_at)),
            None if pull.closed_at.is_none() => waiting.push(waiting_item(pull, now)),
            None => {}
        }
    }

    let waiting = Waiting::from_items(waiting, now);
    let merged_count = count(&merged_recently);
    let total_reviews: u64 = merged_recently.iter().map(|p| count(&p.reviews)).sum();

    #[expect(clippy::cast_precision_loss, reason = "acceptable for averages")]
    let avg_reviews_per_merged = if merged_count == 0 {
        0.0
    } else {
        round2(total_reviews as f64 / merged_count as f64)
    };

    PullMetrics {
        open: count(open),
        open_drafts: count(open.iter().filter(|p| p.is_draft)),
        opened: WindowCounts::from_timestamps(all().map(|p| p.created_at), now),
        merged: WindowCounts::from_timestamps(closed.iter().filter_map(|p| p.merged_at), now),
        closed_without_merge: WindowCounts::from_timestamps(closed.iter().filter(|p| p.is_rejected()).filter_map(|p| p.closed_at), now),
        merge_time: HourStats::from_hours(
            merged_recently
                .iter()
                .filter_map(|p| p.merged_at.map(|m| hours_between(p.created_at, m))),
        ),
        review_time: HourStats::from_hours(review_hours),
        response_time: HourStats::from_hours(response_hours),
        without_review_24h: waiting.over_24_hours,
        without_review_7d: waiting.over_7_days,
        without_review_30d: waiting.over_30_days,
        without_review: waiting.items,
        size,
        review_rate: ratio(count(merged_recently.iter().filter(|p| !p.reviews.is_empty())), merged_count),
        rejection_rate: ratio(rejected_recently, merged_count + rejected_recently),
        avg_reviews_per_merged,
        stale: StaleCounts::from_last_updated(open.iter().map(|p| p.updated_at), now),
    }
}

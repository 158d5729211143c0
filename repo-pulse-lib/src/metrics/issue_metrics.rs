use super::stats::{DayStats, HourStats, StaleCounts, Waiting, WaitingItem, WindowCounts, count, days_between, hours_between, ratio, whole_days};
use crate::facts::{Activity, Issue};
use crate::identity::IdentityMatcher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueMetrics {
    pub open: u64,
    pub opened: WindowCounts,
    pub closed: WindowCounts,

    /// Time from creation to the first maintainer comment, over issues that have one.
    pub response_time: HourStats,

    pub without_response_24h: u64,
    pub without_response_7d: u64,
    pub without_response_30d: u64,

    /// Open issues without a maintainer comment, oldest first.
    pub without_response: Vec<WaitingItem>,

    /// Fraction of open issues carrying at least one label.
    pub label_coverage: f64,
    pub unlabeled: u64,

    pub time_to_close: DayStats,
    pub stale: StaleCounts,

    /// Fraction of closed issues that were reopened at some point.
    pub reopen_rate: f64,
}

/// Earliest comment that counts as a maintainer response to an item by `author`.
pub(super) fn first_maintainer_response<'a>(
    activities: impl IntoIterator<Item = &'a Activity>,
    author: Option<&str>,
    identity: &IdentityMatcher,
) -> Option<DateTime<Utc>> {
    activities
        .into_iter()
        .filter(|a| identity.is_maintainer_response(a.author.as_deref(), author))
        .map(|a| a.created_at)
        .min()
}

fn waiting_item(issue: &Issue, now: DateTime<Utc>) -> WaitingItem {
    WaitingItem {
        number: issue.number,
        title: issue.title.clone(),
        author: issue.author.clone(),
        created_at: issue.created_at,
        days_waiting: whole_days(issue.created_at, now),
    }
}

/// Derive issue health metrics from the open and recently closed issues.
#[must_use]
pub fn compute_issue_metrics(open: &[Issue], closed: &[Issue], identity: &IdentityMatcher, now: DateTime<Utc>) -> IssueMetrics {
    let all = || open.iter().chain(closed);

    let opened = WindowCounts::from_timestamps(all().map(|i| i.created_at), now);
    let closed_counts = WindowCounts::from_timestamps(closed.iter().filter_map(|i| i.closed_at), now);

    let mut response_hours = Vec::new();
    let mut waiting = Vec::new();

    for issue in all() {
        match first_maintainer_response(&issue.comments, issue.author.as_deref(), identity) {
            Some(responded_at) => response_hours.push(hours_between(issue.created_at, responded_at)),
            None if issue.closed_at.is_none() => waiting.push(waiting_item(issue, now)),
            None => {}
        }
    }

    let waiting = Waiting::from_items(waiting, now);
    let unlabeled = count(open.iter().filter(|i| i.labels.is_empty()));
    let open_count = count(open);

    IssueMetrics {
        open: open_count,
        opened,
        closed: closed_counts,
        response_time: HourStats::from_hours(response_hours),
        without_response_24h: waiting.over_24_hours,
        without_response_7d: waiting.over_7_days,
        without_response_30d: waiting.over_30_days,
        without_response: waiting.items,
        label_coverage: ratio(open_count - unlabeled, open_count),
        unlabeled,
        time_to_close: DayStats::from_days(closed.iter().filter_map(|i| i.closed_at.map(|c| days_between(i.created_at, c)))),
        stale: StaleCounts::from_last_updated(open.iter().map(|i| i.updated_at), now),
        reopen_rate: ratio(count(closed.iter().filter(|i| i.reopened)), count(closed)),
    }
}

use super::stats::{count, ratio, round2};
use crate::facts::RepoActivity;
use crate::identity::IdentityMatcher;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of trailing weeks of commit activity reported.
pub const COMMIT_WEEKS: usize = 12;

const ACTIVE_DAYS: i64 = 30;
const FIRST_TIME_LOOKBACK_DAYS: i64 = 120;
const PROXY_PERIOD_DAYS: i64 = 60;

/// Where the retention denominator came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionBasis {
    /// The active set persisted by the previous run.
    PriorPeriod,

    /// Contributors active 30 to 60 days ago, used when no previous run was recorded.
    #[default]
    Proxy,
}

impl core::fmt::Display for RetentionBasis {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PriorPeriod => write!(f, "prior period"),
            Self::Proxy => write!(f, "proxy"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Retention {
    pub basis: RetentionBasis,
    pub basis_size: u64,
    pub retained: u64,
    pub churned: u64,
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributorMetrics {
    pub active_30d: u64,
    pub active_maintainers: u64,
    pub active_community: u64,
    pub first_time: u64,

    /// Sorted logins of first-time contributors.
    pub first_time_contributors: Vec<String>,

    pub retention: Retention,

    /// Commits per week over the trailing weeks, oldest first.
    pub weekly_commits: Vec<u64>,
    pub avg_weekly_commits: f64,

    /// Size of the contributor registry after this run.
    pub total_known_contributors: u64,

    /// Contributors seen for the first time ever by this run.
    pub newly_registered: u64,
}

/// Calculator output: the metrics plus the state to persist for the next run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributorOutcome {
    pub metrics: ContributorMetrics,

    /// Previous registry plus every identity observed in this run.
    pub registry: BTreeSet<String>,

    /// Contributors active in the last 30 days, the next run's prior-period set.
    pub active: BTreeSet<String>,
}

/// `(login, when)` for every non-bot authored issue, pull request and commit.
///
/// Comments and reviews only count towards response times, never towards contribution.
fn contributions<'a>(activity: &'a RepoActivity, identity: &'a IdentityMatcher) -> impl Iterator<Item = (&'a str, DateTime<Utc>)> + 'a {
    let issues = activity
        .open_issues
        .iter()
        .chain(&activity.closed_issues)
        .map(|i| (i.author.as_deref(), i.created_at));
    let pulls = activity
        .open_pulls
        .iter()
        .chain(&activity.closed_pulls)
        .map(|p| (p.author.as_deref(), p.created_at));
    let commits = activity.commits.iter().map(|c| (c.author.as_deref(), c.committed_at));

    issues
        .chain(pulls)
        .chain(commits)
        .filter_map(|(author, at)| identity.human(author).map(|a| (a, at)))
}

/// Commit counts per week, oldest week first; commits outside the window are ignored.
fn weekly_commit_counts(activity: &RepoActivity, now: DateTime<Utc>) -> Vec<u64> {
    let mut weeks = vec![0u64; COMMIT_WEEKS];

    for commit in &activity.commits {
        let age = now - commit.committed_at;
        if age < Duration::zero() {
            continue;
        }

        if let Ok(weeks_ago) = usize::try_from(age.num_weeks())
            && weeks_ago < COMMIT_WEEKS
        {
            weeks[COMMIT_WEEKS - 1 - weeks_ago] += 1;
        }
    }

    weeks
}

/// Derive contributor activity, first-timers and retention.
///
/// `registry` is the persisted set of every contributor seen before; `prior_active` is the
/// active set persisted by the previous run, if there was one.
#[must_use]
pub fn compute_contributor_metrics(
    activity: &RepoActivity,
    identity: &IdentityMatcher,
    registry: &BTreeSet<String>,
    prior_active: Option<&BTreeSet<String>>,
    now: DateTime<Utc>,
) -> ContributorOutcome {
    let active_start = now - Duration::days(ACTIVE_DAYS);
    let lookback_start = now - Duration::days(FIRST_TIME_LOOKBACK_DAYS);
    let proxy_start = now - Duration::days(PROXY_PERIOD_DAYS);

    let mut observed = BTreeSet::new();
    let mut active = BTreeSet::new();
    let mut earlier = BTreeSet::new();
    let mut proxy = BTreeSet::new();

    for (login, at) in contributions(activity, identity) {
        let _ = observed.insert(login.to_string());

        if at >= active_start {
            let _ = active.insert(login.to_string());
        } else {
            if at >= lookback_start {
                let _ = earlier.insert(login);
            }
            if at >= proxy_start {
                let _ = proxy.insert(login.to_string());
            }
        }
    }

    let first_time_contributors: Vec<String> = active.iter().filter(|l| !earlier.contains(l.as_str())).cloned().collect();

    let (basis, basis_set) = prior_active.map_or((RetentionBasis::Proxy, &proxy), |prior| (RetentionBasis::PriorPeriod, prior));
    let retained = count(basis_set.intersection(&active));
    let basis_size = count(basis_set);

    let active_maintainers = count(active.iter().filter(|l| identity.is_maintainer(l)));
    let weekly_commits = weekly_commit_counts(activity, now);

    #[expect(clippy::cast_precision_loss, reason = "acceptable for averages")]
    let avg_weekly_commits = round2(weekly_commits.iter().sum::<u64>() as f64 / COMMIT_WEEKS as f64);

    let newly_registered = count(observed.iter().filter(|l| !registry.contains(*l)));
    let mut merged_registry = registry.clone();
    merged_registry.extend(observed);

    let metrics = ContributorMetrics {
        active_30d: count(&active),
        active_maintainers,
        active_community: count(&active) - active_maintainers,
        first_time: count(&first_time_contributors),
        first_time_contributors,
        retention: Retention {
            basis,
            basis_size,
            retained,
            churned: basis_size - retained,
            rate: ratio(retained, basis_size),
        },
        weekly_commits,
        avg_weekly_commits,
        total_known_contributors: count(&merged_registry),
        newly_registered,
    };

    ContributorOutcome {
        metrics,
        registry: merged_registry,
        active,
    }
}

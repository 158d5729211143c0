use super::contributor_metrics::{ContributorMetrics, compute_contributor_metrics};
use super::hotspots::{Hotspots, compute_hotspots};
use super::issue_metrics::{IssueMetrics, compute_issue_metrics};
use super::pull_metrics::{PullMetrics, compute_pull_metrics};
use crate::facts::{RepoActivity, RepoCounters, RepoSpec};
use crate::identity::IdentityMatcher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything computed for one repository in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoMetrics {
    pub repository: String,
    pub generated_at: DateTime<Utc>,

    /// Number of maintainers known when the metrics were computed. Zero means every
    /// maintainer-based figure treats all items as unanswered.
    pub maintainer_count: u64,

    pub counters: RepoCounters,
    pub issues: IssueMetrics,
    pub pull_requests: PullMetrics,
    pub contributors: ContributorMetrics,
    pub hotspots: Hotspots,
}

/// Contributor state carried from one run to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributorHistory {
    pub registry: BTreeSet<String>,
    pub prior_active: Option<BTreeSet<String>>,
}

/// Run every calculator over `activity`.
///
/// Returns the metrics and the contributor history to persist for the next run.
#[must_use]
pub fn compute_repo_metrics(
    repo: &RepoSpec,
    activity: &RepoActivity,
    identity: &IdentityMatcher,
    history: &ContributorHistory,
    now: DateTime<Utc>,
) -> (RepoMetrics, ContributorHistory) {
    let contributors = compute_contributor_metrics(activity, identity, &history.registry, history.prior_active.as_ref(), now);

    let metrics = RepoMetrics {
        repository: repo.to_string(),
        generated_at: now,
        maintainer_count: identity.maintainer_count() as u64,
        counters: activity.counters,
        issues: compute_issue_metrics(&activity.open_issues, &activity.closed_issues, identity, now),
        pull_requests: compute_pull_metrics(&activity.open_pulls, &activity.closed_pulls, identity, now),
        contributors: contributors.metrics,
        hotspots: compute_hotspots(&activity.merged_pull_files),
    };

    let history = ContributorHistory {
        registry: contributors.registry,
        prior_active: Some(contributors.active),
    };

    (metrics, history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FileChange, Issue};

    #[test]
    fn metrics_are_a_function_of_inputs() {
        let now = DateTime::from_timestamp(1_750_000_000, 0).unwrap();
        let repo: RepoSpec = "octo/widgets".parse().unwrap();
        let identity = IdentityMatcher::with_default_bots(["alice"]).unwrap();

        let activity = RepoActivity {
            counters: RepoCounters {
                stars: 42,
                forks: 7,
                watchers: 3,
                open_issues: 1,
            },
            open_issues: vec![Issue {
                number: 1,
                title: "Broken".into(),
                author: Some("carol".into()),
                created_at: now - chrono::Duration::days(2),
                updated_at: now - chrono::Duration::days(2),
                closed_at: None,
                labels: Vec::new(),
                comments: Vec::new(),
                reopened: false,
            }],
            merged_pull_files: vec![(
                9,
                vec![FileChange {
                    filename: "src/main.rs".into(),
                    additions: 1,
                    deletions: 1,
                    changes: 2,
                }],
            )],
            ..RepoActivity::default()
        };

        let (first, history) = compute_repo_metrics(&repo, &activity, &identity, &ContributorHistory::default(), now);
        let (second, _) = compute_repo_metrics(&repo, &activity, &identity, &ContributorHistory::default(), now);

        assert_eq!(first, second);
        assert_eq!(first.repository, "octo/widgets");
        assert_eq!(first.counters.stars, 42);
        assert_eq!(first.maintainer_count, 1);
        assert_eq!(first.issues.open, 1);
        assert_eq!(first.hotspots.files[0].path, "src/main.rs");
        assert!(history.registry.contains("carol"));
        assert_eq!(history.prior_active.as_ref().map(BTreeSet::len), Some(1));
    }
}

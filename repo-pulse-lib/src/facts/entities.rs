//! Repository activity as collected from the hosting API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment or review: who did it and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// `None` for deleted accounts.
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub comments: Vec<Activity>,

    /// The timeline contains at least one reopen event.
    pub reopened: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub additions: u64,
    pub deletions: u64,
    pub is_draft: bool,
    pub comments: Vec<Activity>,
    pub reviews: Vec<Activity>,
    pub reopened: bool,
}

impl PullRequest {
    #[must_use]
    pub const fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    /// Closed without being merged.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.closed_at.is_some() && self.merged_at.is_none()
    }

    /// Lines added plus lines deleted.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.additions.saturating_add(self.deletions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Login of the linked account, `None` when the commit email maps to no account.
    pub author: Option<String>,
    pub committed_at: DateTime<Utc>,
}

/// One entry of a pull request's changed-file listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileChange {
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changes: u64,
}

/// Repository-level counters reported by the REST repository endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoCounters {
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
}

/// Everything collected for one repository in one run.
#[derive(Debug, Clone, Default)]
pub struct RepoActivity {
    pub counters: RepoCounters,
    pub open_issues: Vec<Issue>,
    pub closed_issues: Vec<Issue>,
    pub open_pulls: Vec<PullRequest>,

    /// Merged and closed-without-merge pull requests inside the lookback window.
    pub closed_pulls: Vec<PullRequest>,

    /// Default-branch commits inside the commit window.
    pub commits: Vec<Commit>,

    /// Changed files of each merged pull request inside the lookback window, by PR number.
    pub merged_pull_files: Vec<(u64, Vec<FileChange>)>,
}

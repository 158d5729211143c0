use super::file_changes::{BatchOptions, fetch_file_changes};
use super::pagination::{Page, collect_pages};
use super::queries::{
    COMMITS_QUERY, CommitNode, CommitsRepository, ISSUE_COMMENTS_QUERY, ISSUES_QUERY, IssueNode, NestedRepository, PULL_REQUEST_COMMENTS_QUERY,
    PULL_REQUEST_REVIEWS_QUERY, PULL_REQUESTS_QUERY, PagedRepository, PullRequestNode, RepositoryData,
};
use super::{Activity, ApiError, Client, Commit, Issue, PullRequest, RepoActivity, RepoSpec};
use chrono::{DateTime, SecondsFormat, Utc};
use core::time::Duration;
use serde::de::DeserializeOwned;
use serde_json::json;

const LOG_TARGET: &str = " collector";

/// Largest page the GraphQL API hands out.
const PAGE_SIZE: u32 = 100;

/// Default pause between consecutive page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

/// Default span of closed issues and pull requests to collect.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 90;

/// Trailing span of default-branch commits to collect.
pub const COMMIT_WINDOW_WEEKS: i64 = 12;

/// Which end of an item's lifecycle to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Open,

    /// Closed issues; merged and closed-without-merge pull requests.
    Closed,
}

impl ItemState {
    const fn issue_states(self) -> &'static [&'static str] {
        match self {
            Self::Open => &["OPEN"],
            Self::Closed => &["CLOSED"],
        }
    }

    const fn pull_request_states(self) -> &'static [&'static str] {
        match self {
            Self::Open => &["OPEN"],
            Self::Closed => &["MERGED", "CLOSED"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorOptions {
    pub page_delay: Duration,
    pub lookback_days: u32,
    pub files: BatchOptions,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            files: BatchOptions::default(),
        }
    }
}

/// Collects a repository's issues, pull requests, commits and changed files.
#[derive(Debug, Clone)]
pub struct Collector {
    client: Client,
    options: CollectorOptions,
}

impl Collector {
    #[must_use]
    pub const fn new(client: Client, options: CollectorOptions) -> Self {
        Self { client, options }
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Start of the window for closed items and merged pull requests.
    #[must_use]
    pub fn lookback_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(i64::from(self.options.lookback_days))
    }

    /// Collect everything the metric calculators need for `repo`.
    pub async fn collect(&self, repo: &RepoSpec, now: DateTime<Utc>) -> Result<RepoActivity, ApiError> {
        log::info!(target: LOG_TARGET, "Collecting activity for '{repo}'");

        let counters = self.client.repo_counters(repo.owner(), repo.repo()).await?;
        let open_issues = self.issues(repo, ItemState::Open, now).await?;
        let closed_issues = self.issues(repo, ItemState::Closed, now).await?;
        let open_pulls = self.pull_requests(repo, ItemState::Open, now).await?;
        let closed_pulls = self.pull_requests(repo, ItemState::Closed, now).await?;
        let commits = self.commits(repo, now - chrono::Duration::weeks(COMMIT_WINDOW_WEEKS)).await?;

        let window_start = self.lookback_start(now);
        let merged: Vec<u64> = closed_pulls
            .iter()
            .filter(|p| p.merged_at.is_some_and(|t| t >= window_start))
            .map(|p| p.number)
            .collect();
        let merged_pull_files = fetch_file_changes(&self.client, repo, &merged, self.options.files).await;

        log::info!(
            target: LOG_TARGET,
            "Collected {} open and {} closed issue(s), {} open and {} closed pull request(s), {} commit(s) for '{repo}'",
            open_issues.len(),
            closed_issues.len(),
            open_pulls.len(),
            closed_pulls.len(),
            commits.len(),
        );

        Ok(RepoActivity {
            counters,
            open_issues,
            closed_issues,
            open_pulls,
            closed_pulls,
            commits,
            merged_pull_files,
        })
    }

    pub async fn issues(&self, repo: &RepoSpec, state: ItemState, now: DateTime<Utc>) -> Result<Vec<Issue>, ApiError> {
        let cutoff = (state == ItemState::Closed).then(|| self.lookback_start(now));

        let nodes = collect_pages("issues", None, cutoff, self.options.page_delay, |cursor| {
            let variables = json!({
                "owner": repo.owner(),
                "name": repo.repo(),
                "states": state.issue_states(),
                "pageSize": PAGE_SIZE,
                "cursor": cursor,
            });
            self.page::<IssueNode>(repo, "issues", ISSUES_QUERY, variables)
        })
        .await?;

        let mut issues = Vec::with_capacity(nodes.len());
        for node in nodes {
            let (mut issue, truncated) = node.into_issue();
            if let Some(cursor) = truncated.comments {
                let rest = self.remaining_activity(repo, ISSUE_COMMENTS_QUERY, issue.number, cursor).await?;
                issue.comments.extend(rest);
            }
            issues.push(issue);
        }

        Ok(issues)
    }

    pub async fn pull_requests(&self, repo: &RepoSpec, state: ItemState, now: DateTime<Utc>) -> Result<Vec<PullRequest>, ApiError> {
        let cutoff = (state == ItemState::Closed).then(|| self.lookback_start(now));

        let nodes = collect_pages("pull requests", None, cutoff, self.options.page_delay, |cursor| {
            let variables = json!({
                "owner": repo.owner(),
                "name": repo.repo(),
                "states": state.pull_request_states(),
                "pageSize": PAGE_SIZE,
                "cursor": cursor,
            });
            self.page::<PullRequestNode>(repo, "pull requests", PULL_REQUESTS_QUERY, variables)
        })
        .await?;

        let mut pulls = Vec::with_capacity(nodes.len());
        for node in nodes {
            let (mut pull, truncated) = node.into_pull_request();
            if let Some(cursor) = truncated.comments {
                let rest = self.remaining_activity(repo, PULL_REQUEST_COMMENTS_QUERY, pull.number, cursor).await?;
                pull.comments.extend(rest);
            }
            if let Some(cursor) = truncated.reviews {
                let rest = self.remaining_activity(repo, PULL_REQUEST_REVIEWS_QUERY, pull.number, cursor).await?;
                pull.reviews.extend(rest);
            }
            pulls.push(pull);
        }

        Ok(pulls)
    }

    /// Default-branch commits since `since`, newest first.
    pub async fn commits(&self, repo: &RepoSpec, since: DateTime<Utc>) -> Result<Vec<Commit>, ApiError> {
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);

        let nodes = collect_pages("commits", None, None, self.options.page_delay, |cursor| {
            let variables = json!({
                "owner": repo.owner(),
                "name": repo.repo(),
                "since": since,
                "pageSize": PAGE_SIZE,
                "cursor": cursor,
            });
            self.commit_page(repo, variables)
        })
        .await?;

        Ok(nodes.into_iter().map(Commit::from).collect())
    }

    /// Comments or reviews of one item beyond the first nested page.
    async fn remaining_activity(&self, repo: &RepoSpec, query: &'static str, number: u64, cursor: String) -> Result<Vec<Activity>, ApiError> {
        log::debug!(target: LOG_TARGET, "Fetching more nested activity for #{number} in '{repo}'");

        let nodes = collect_pages("nested activity", Some(cursor), None, self.options.page_delay, |cursor| {
            let variables = json!({
                "owner": repo.owner(),
                "name": repo.repo(),
                "number": number,
                "pageSize": PAGE_SIZE,
                "cursor": cursor,
            });
            self.nested_page(repo, query, number, variables)
        })
        .await?;

        Ok(nodes.into_iter().map(Activity::from).collect())
    }

    async fn page<N>(&self, repo: &RepoSpec, operation: &'static str, query: &'static str, variables: serde_json::Value) -> Result<Page<N>, ApiError>
    where
        N: DeserializeOwned + Send + 'static,
    {
        let data: RepositoryData<PagedRepository<N>> = self.client.graphql(operation, query, variables).await?;
        Ok(require_repository(data, repo)?.page.into_page())
    }

    async fn nested_page(
        &self,
        repo: &RepoSpec,
        query: &'static str,
        number: u64,
        variables: serde_json::Value,
    ) -> Result<Page<super::queries::ActivityNode>, ApiError> {
        let data: RepositoryData<NestedRepository> = self.client.graphql("nested activity", query, variables).await?;
        let item = require_repository(data, repo)?
            .item
            .ok_or_else(|| ApiError::NotFound(format!("#{number} in repository {repo}")))?;
        Ok(item.page.into_page())
    }

    async fn commit_page(&self, repo: &RepoSpec, variables: serde_json::Value) -> Result<Page<CommitNode>, ApiError> {
        let data: RepositoryData<CommitsRepository> = self.client.graphql("commits", COMMITS_QUERY, variables).await?;

        // An empty repository has no default branch, so no history.
        Ok(require_repository(data, repo)?
            .default_branch_ref
            .and_then(|b| b.target)
            .and_then(|t| t.page)
            .map_or_else(
                || Page {
                    items: Vec::new(),
                    end_cursor: None,
                    has_next_page: false,
                },
                super::queries::Connection::into_page,
            ))
    }
}

fn require_repository<T>(data: RepositoryData<T>, repo: &RepoSpec) -> Result<T, ApiError> {
    data.repository.ok_or_else(|| ApiError::NotFound(format!("repository {repo}")))
}

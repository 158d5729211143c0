//! GraphQL documents and their response shapes.

use super::pagination::{Page, Timestamped};
use super::{Activity, Commit, Issue, PullRequest};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const ISSUES_QUERY: &str = r"
query($owner: String!, $name: String!, $states: [IssueState!], $pageSize: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    page: issues(first: $pageSize, after: $cursor, states: $states, orderBy: {field: UPDATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes {
        number title createdAt updatedAt closedAt
        author { login }
        labels(first: 20) { nodes { name } }
        comments(first: 100) { pageInfo { hasNextPage endCursor } nodes { author { login } createdAt } }
        timelineItems(itemTypes: [REOPENED_EVENT], first: 1) { totalCount }
      }
    }
  }
}";

pub const PULL_REQUESTS_QUERY: &str = r"
query($owner: String!, $name: String!, $states: [PullRequestState!], $pageSize: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    page: pullRequests(first: $pageSize, after: $cursor, states: $states, orderBy: {field: UPDATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes {
        number title createdAt updatedAt closedAt mergedAt additions deletions isDraft
        author { login }
        labels(first: 20) { nodes { name } }
        comments(first: 100) { pageInfo { hasNextPage endCursor } nodes { author { login } createdAt } }
        reviews(first: 100) { pageInfo { hasNextPage endCursor } nodes { author { login } createdAt } }
        timelineItems(itemTypes: [REOPENED_EVENT], first: 1) { totalCount }
      }
    }
  }
}";

pub const ISSUE_COMMENTS_QUERY: &str = r"
query($owner: String!, $name: String!, $number: Int!, $pageSize: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    item: issue(number: $number) {
      page: comments(first: $pageSize, after: $cursor) { pageInfo { hasNextPage endCursor } nodes { author { login } createdAt } }
    }
  }
}";

pub const PULL_REQUEST_COMMENTS_QUERY: &str = r"
query($owner: String!, $name: String!, $number: Int!, $pageSize: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    item: pullRequest(number: $number) {
      page: comments(first: $pageSize, after: $cursor) { pageInfo { hasNextPage endCursor } nodes { author { login } createdAt } }
    }
  }
}";

pub const PULL_REQUEST_REVIEWS_QUERY: &str = r"
query($owner: String!, $name: String!, $number: Int!, $pageSize: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    item: pullRequest(number: $number) {
      page: reviews(first: $pageSize, after: $cursor) { pageInfo { hasNextPage endCursor } nodes { author { login } createdAt } }
    }
  }
}";

pub const COMMITS_QUERY: &str = r"
query($owner: String!, $name: String!, $since: GitTimestamp!, $pageSize: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          page: history(first: $pageSize, after: $cursor, since: $since) {
            pageInfo { hasNextPage endCursor }
            nodes { committedDate author { user { login } } }
          }
        }
      }
    }
  }
}";

/// Top-level `data` member: a `null` repository means not found or not visible.
#[derive(Debug, Deserialize)]
pub struct RepositoryData<T> {
    pub repository: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct PagedRepository<T> {
    pub page: Connection<T>,
}

#[derive(Debug, Deserialize)]
pub struct NestedRepository {
    pub item: Option<PagedRepository<ActivityNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitsRepository {
    pub default_branch_ref: Option<BranchRef>,
}

#[derive(Debug, Deserialize)]
pub struct BranchRef {
    pub target: Option<CommitTarget>,
}

#[derive(Debug, Deserialize)]
pub struct CommitTarget {
    /// Absent when the branch head is not a commit.
    #[serde(default)]
    pub page: Option<Connection<CommitNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub page_info: PageInfo,
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

impl<T> Connection<T> {
    pub fn into_page(self) -> Page<T> {
        Page {
            items: self.nodes.into_iter().flatten().collect(),
            end_cursor: self.page_info.end_cursor,
            has_next_page: self.page_info.has_next_page,
        }
    }

    /// Cursor to resume from when this nested connection was truncated.
    fn resume_cursor(&self) -> Option<String> {
        if self.page_info.has_next_page {
            self.page_info.end_cursor.clone()
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct LabelNode {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Labels {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<LabelNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityNode {
    pub author: Option<Login>,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityNode> for Activity {
    fn from(node: ActivityNode) -> Self {
        Self {
            author: node.author.map(|a| a.login),
            created_at: node.created_at,
        }
    }
}

impl Timestamped for ActivityNode {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueNode {
    pub number: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub author: Option<Login>,
    pub labels: Option<Labels>,
    pub comments: Connection<ActivityNode>,
    pub timeline_items: TotalCount,
}

impl Timestamped for IssueNode {
    fn timestamp(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub number: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    pub is_draft: bool,
    pub author: Option<Login>,
    pub labels: Option<Labels>,
    pub comments: Connection<ActivityNode>,
    pub reviews: Connection<ActivityNode>,
    pub timeline_items: TotalCount,
}

impl Timestamped for PullRequestNode {
    fn timestamp(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Deserialize)]
pub struct CommitAuthor {
    pub user: Option<Login>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub committed_date: DateTime<Utc>,
    pub author: Option<CommitAuthor>,
}

impl Timestamped for CommitNode {
    fn timestamp(&self) -> DateTime<Utc> {
        self.committed_date
    }
}

impl From<CommitNode> for Commit {
    fn from(node: CommitNode) -> Self {
        Self {
            author: node.author.and_then(|a| a.user).map(|u| u.login),
            committed_at: node.committed_date,
        }
    }
}

/// Where to resume nested lists that did not fit in the first page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Truncated {
    pub comments: Option<String>,
    pub reviews: Option<String>,
}

fn label_names(labels: Option<Labels>) -> Vec<String> {
    labels
        .map(|l| l.nodes.into_iter().flatten().map(|n| n.name).collect())
        .unwrap_or_default()
}

fn activities(connection: Connection<ActivityNode>) -> Vec<Activity> {
    connection.nodes.into_iter().flatten().map(Activity::from).collect()
}

impl IssueNode {
    pub fn into_issue(self) -> (Issue, Truncated) {
        let truncated = Truncated {
            comments: self.comments.resume_cursor(),
            reviews: None,
        };

        let issue = Issue {
            number: self.number,
            title: self.title,
            author: self.author.map(|a| a.login),
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
            labels: label_names(self.labels),
            comments: activities(self.comments),
            reopened: self.timeline_items.total_count > 0,
        };

        (issue, truncated)
    }
}

impl PullRequestNode {
    pub fn into_pull_request(self) -> (PullRequest, Truncated) {
        let truncated = Truncated {
            comments: self.comments.resume_cursor(),
            reviews: self.reviews.resume_cursor(),
        };

        let pull = PullRequest {
            number: self.number,
            title: self.title,
            author: self.author.map(|a| a.login),
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
            merged_at: self.merged_at,
            labels: label_names(self.labels),
            additions: self.additions,
            deletions: self.deletions,
            is_draft: self.is_draft,
            comments: activities(self.comments),
            reviews: activities(self.reviews),
            reopened: self.timeline_items.total_count > 0,
        };

        (pull, truncated)
    }
}

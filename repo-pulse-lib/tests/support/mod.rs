//! Shared wiremock scaffolding for the GitHub-facing integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset of these helpers")]

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use repo_pulse_lib::Host;
use repo_pulse_lib::facts::{BatchOptions, Client, Collector, CollectorOptions, RetryPolicy};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const ISSUES: &str = "page: issues(";
pub const PULL_REQUESTS: &str = "page: pullRequests(";
pub const COMMITS: &str = "page: history(";
pub const NESTED_COMMENTS: &str = "page: comments(";
pub const NESTED_REVIEWS: &str = "page: reviews(";

/// Test host that captures output to in-memory buffers.
#[derive(Debug, Default)]
pub struct TestHost {
    pub output_buf: Vec<u8>,
    pub error_buf: Vec<u8>,
    pub exit_code: Option<i32>,
}

impl TestHost {
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }

    pub fn error_str(&self) -> String {
        String::from_utf8_lossy(&self.error_buf).into_owned()
    }
}

impl Host for TestHost {
    fn output(&mut self) -> impl std::io::Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl std::io::Write {
        &mut self.error_buf
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}

/// Matches a GraphQL POST by a fragment of its query text, the first requested state
/// and the page cursor (`None` matches the first page only).
#[derive(Debug, Clone, Copy)]
pub struct GraphQlCall {
    fragment: &'static str,
    state: Option<&'static str>,
    cursor: Option<&'static str>,
}

impl GraphQlCall {
    pub const fn new(fragment: &'static str) -> Self {
        Self {
            fragment,
            state: None,
            cursor: None,
        }
    }

    pub const fn state(mut self, state: &'static str) -> Self {
        self.state = Some(state);
        self
    }

    pub const fn after(mut self, cursor: &'static str) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

impl Match for GraphQlCall {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return false;
        };

        let query = body["query"].as_str().unwrap_or_default();
        let variables = &body["variables"];

        query.contains(self.fragment)
            && self.state.is_none_or(|state| variables["states"][0] == state)
            && variables["cursor"].as_str() == self.cursor
    }
}

pub fn timestamp(now: DateTime<Utc>, hours_ago: i64) -> String {
    (now - Duration::hours(hours_ago)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn connection(nodes: Value, next: Option<&str>) -> Value {
    json!({
        "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next },
        "nodes": nodes,
    })
}

/// GraphQL response for one page of issues or pull requests.
pub fn repository_page(nodes: Value, next: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": { "repository": { "page": connection(nodes, next) } } }))
}

/// GraphQL response for one page of default-branch history.
pub fn commits_page(nodes: Value, next: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": { "repository": { "defaultBranchRef": { "target": { "page": connection(nodes, next) } } } }
    }))
}

/// GraphQL response for one follow-up page of an item's comments or reviews.
pub fn activity_page(nodes: Value, next: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": { "repository": { "item": { "page": connection(nodes, next) } } } }))
}

fn login(login: &str) -> Value {
    json!({ "login": login })
}

pub fn activity(author: &str, created_at: &str) -> Value {
    json!({ "author": login(author), "createdAt": created_at })
}

pub fn issue_node(number: u64, author: &str, now: DateTime<Utc>, created_hours_ago: i64, closed_hours_ago: Option<i64>) -> Value {
    let updated = closed_hours_ago.unwrap_or(created_hours_ago);
    json!({
        "number": number,
        "title": format!("Issue {number}"),
        "createdAt": timestamp(now, created_hours_ago),
        "updatedAt": timestamp(now, updated),
        "closedAt": closed_hours_ago.map(|h| timestamp(now, h)),
        "author": login(author),
        "labels": { "nodes": [{ "name": "bug" }] },
        "comments": connection(json!([]), None),
        "timelineItems": { "totalCount": 0 },
    })
}

/// Issue answered by `responder` one hour after it was opened.
pub fn answered_issue_node(number: u64, author: &str, responder: &str, now: DateTime<Utc>, created_hours_ago: i64) -> Value {
    let mut node = issue_node(number, author, now, created_hours_ago, None);
    node["comments"] = connection(json!([activity(responder, &timestamp(now, created_hours_ago - 1))]), None);
    node
}

pub fn merged_pull_node(number: u64, author: &str, reviewer: &str, now: DateTime<Utc>, created_hours_ago: i64, merged_hours_ago: i64) -> Value {
    json!({
        "number": number,
        "title": format!("Pull request {number}"),
        "createdAt": timestamp(now, created_hours_ago),
        "updatedAt": timestamp(now, merged_hours_ago),
        "closedAt": timestamp(now, merged_hours_ago),
        "mergedAt": timestamp(now, merged_hours_ago),
        "additions": 40,
        "deletions": 5,
        "isDraft": false,
        "author": login(author),
        "labels": { "nodes": [] },
        "comments": connection(json!([]), None),
        "reviews": connection(json!([activity(reviewer, &timestamp(now, created_hours_ago - 2))]), None),
        "timelineItems": { "totalCount": 0 },
    })
}

pub fn commit_node(author: &str, now: DateTime<Utc>, hours_ago: i64) -> Value {
    json!({ "committedDate": timestamp(now, hours_ago), "author": { "user": login(author) } })
}

pub fn repository_counters() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "stargazers_count": 120,
        "forks_count": 14,
        "subscribers_count": 9,
        "open_issues_count": 3,
    }))
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: core::time::Duration::from_millis(5),
        ..RetryPolicy::default()
    }
}

pub fn client(server: &MockServer) -> Client {
    Client::new("test-token", &server.uri(), fast_policy()).expect("client should build")
}

pub fn collector(server: &MockServer) -> Collector {
    Collector::new(
        client(server),
        CollectorOptions {
            page_delay: core::time::Duration::ZERO,
            lookback_days: 90,
            files: BatchOptions {
                batch_size: 5,
                batch_delay: core::time::Duration::ZERO,
            },
        },
    )
}

/// Mount a small but complete repository `octo/widgets`:
/// three open issues over two pages, one closed issue, one merged pull request with two
/// changed files, and a handful of commits.
pub async fn mount_widgets(server: &MockServer, now: DateTime<Utc>) {
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets"))
        .respond_with(repository_counters())
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(GraphQlCall::new(ISSUES).state("OPEN"))
        .respond_with(repository_page(
            json!([
                answered_issue_node(3, "newcomer", "alice", now, 10),
                issue_node(2, "carol", now, 30, None),
            ]),
            Some("issues-1"),
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(GraphQlCall::new(ISSUES).state("OPEN").after("issues-1"))
        .respond_with(repository_page(json!([issue_node(1, "dependabot[bot]", now, 200, None)]), None))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(GraphQlCall::new(ISSUES).state("CLOSED"))
        .respond_with(repository_page(json!([issue_node(4, "carol", now, 72, Some(24))]), None))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(GraphQlCall::new(PULL_REQUESTS).state("OPEN"))
        .respond_with(repository_page(json!([]), None))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(GraphQlCall::new(PULL_REQUESTS).state("MERGED"))
        .respond_with(repository_page(json!([merged_pull_node(7, "carol", "alice", now, 48, 12)]), None))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(GraphQlCall::new(COMMITS))
        .respond_with(commits_page(
            json!([
                commit_node("carol", now, 12),
                commit_node("alice", now, 40),
                commit_node("renovate[bot]", now, 50),
            ]),
            None,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/pulls/7/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "filename": "src/lib.rs", "additions": 30, "deletions": 5, "changes": 35 },
            { "filename": "README.md", "additions": 10, "deletions": 0, "changes": 10 },
        ])))
        .mount(server)
        .await;
}

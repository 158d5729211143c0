//! GitHub API client
//!
//! Minimal client for the GitHub GraphQL and REST APIs. Every call goes through
//! [`with_retry`], and every non-success response is classified into an [`ApiError`].

use super::resilient_http::{RetryPolicy, with_retry};
use super::{ApiError, RepoCounters};
use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::IntoAppError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

const LOG_TARGET: &str = "    github";

/// Upper bound on `Link: rel="next"` pages followed by [`Client::get_all_pages`].
const MAX_REST_PAGES: usize = 30;

/// Longest error body excerpt carried in a [`ApiError::Client`] message.
const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[expect(clippy::struct_field_names, reason = "field names match GitHub API exactly")]
struct Repository {
    stargazers_count: Option<u64>,
    forks_count: Option<u64>,
    subscribers_count: Option<u64>,
    open_issues_count: Option<u64>,
}

impl From<Repository> for RepoCounters {
    fn from(repo: Repository) -> Self {
        Self {
            stars: repo.stargazers_count.unwrap_or(0),
            forks: repo.forks_count.unwrap_or(0),
            watchers: repo.subscribers_count.unwrap_or(0),
            open_issues: repo.open_issues_count.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl<T> GraphQlResponse<T> {
    fn into_data(self) -> Result<T, ApiError> {
        if !self.errors.is_empty() {
            if self.errors.iter().any(|e| e.kind.as_deref() == Some("RATE_LIMITED")) {
                return Err(ApiError::RateLimited { retry_after: None });
            }

            let message = self.errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; ");
            return Err(ApiError::GraphQl(message));
        }

        self.data.ok_or_else(|| ApiError::Decode("GraphQL response carries neither data nor errors".into()))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// GitHub API client
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Arc<str>,
    policy: RetryPolicy,
}

impl Client {
    /// Create a new API client with an authentication token, base URL and retry policy
    pub fn new(token: &str, base_url: &str, policy: RetryPolicy) -> Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};

        let mut auth_val = HeaderValue::from_str(&format!("Bearer {token}")).into_app_err("invalid GitHub token")?;
        auth_val.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, auth_val);
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let http = reqwest::Client::builder()
            .user_agent(concat!("repo-pulse/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .into_app_err("creating HTTP client")?;

        Ok(Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            policy,
        })
    }

    /// Get the base URL for this client
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one GraphQL query and decode its `data` member.
    pub async fn graphql<T>(&self, operation: &'static str, query: &'static str, variables: serde_json::Value) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let http = self.http.clone();
        let url: Arc<str> = Arc::from(format!("{}/graphql", self.base_url));
        let body = Arc::new(serde_json::json!({ "query": query, "variables": variables }));

        with_retry(operation, self.policy, move || {
            let http = http.clone();
            let url = Arc::clone(&url);
            let body = Arc::clone(&body);
            async move {
                let resp = check_status(http.post(&*url).json(&*body).send().await?).await?;
                let envelope: GraphQlResponse<T> = serde_json::from_slice(&resp.bytes().await?)?;
                envelope.into_data()
            }
        })
        .await
    }

    /// GET a REST path (relative to the base URL) and decode the JSON body.
    pub async fn get_json<T>(&self, operation: &'static str, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = format!("{}{path}", self.base_url);
        let (value, _) = self.get_page::<T>(operation, url).await?;
        Ok(value)
    }

    /// GET a paginated REST collection, following `Link: rel="next"` headers.
    pub async fn get_all_pages<T>(&self, operation: &'static str, path: &str) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut url = format!("{}{path}", self.base_url);
        let mut items = Vec::new();

        for _ in 0..MAX_REST_PAGES {
            let (page, next): (Vec<T>, _) = self.get_page(operation, url).await?;
            items.extend(page);

            match next {
                Some(next) => url = next,
                None => return Ok(items),
            }
        }

        log::debug!(target: LOG_TARGET, "stopped following {operation} pages after {MAX_REST_PAGES} pages");
        Ok(items)
    }

    /// GET an absolute URL as text, for raw documents outside the API.
    pub async fn get_text(&self, operation: &'static str, url: &str) -> Result<String, ApiError> {
        let http = self.http.clone();
        let url: Arc<str> = Arc::from(url);

        with_retry(operation, self.policy, move || {
            let http = http.clone();
            let url = Arc::clone(&url);
            async move { Ok(check_status(http.get(&*url).send().await?).await?.text().await?) }
        })
        .await
    }

    pub async fn repo_counters(&self, owner: &str, repo: &str) -> Result<RepoCounters, ApiError> {
        let repository: Repository = self.get_json("repository", &format!("/repos/{owner}/{repo}")).await?;
        Ok(repository.into())
    }

    async fn get_page<T>(&self, operation: &'static str, url: String) -> Result<(T, Option<String>), ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let http = self.http.clone();
        let url: Arc<str> = Arc::from(url);

        with_retry(operation, self.policy, move || {
            let http = http.clone();
            let url = Arc::clone(&url);
            async move {
                let resp = check_status(http.get(&*url).send().await?).await?;
                let next = next_page_url(resp.headers());
                let value = serde_json::from_slice(&resp.bytes().await?)?;
                Ok((value, next))
            }
        })
        .await
    }
}

/// Pass successful responses through, turn everything else into a classified error.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let headers = resp.headers().clone();
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();

    Err(classify_failure(status, &headers, &body, &url, Utc::now()))
}

fn classify_failure(status: StatusCode, headers: &HeaderMap, body: &str, url: &str, now: DateTime<Utc>) -> ApiError {
    let retry_after = retry_after_from_headers(headers, now);
    let quota_exhausted = extract_rate_limit_from_headers(headers).is_some_and(|rl| rl.remaining == 0);

    match status.as_u16() {
        429 => ApiError::RateLimited { retry_after },
        403 if retry_after.is_some() || quota_exhausted || body.to_ascii_lowercase().contains("rate limit") => {
            ApiError::RateLimited { retry_after }
        }
        404 => ApiError::NotFound(url.to_string()),
        code @ 500..=599 => ApiError::Server { status: code },
        code => {
            let mut message = serde_json::from_str::<ErrorBody>(body).map_or_else(|_| body.trim().to_string(), |b| b.message);
            if message.len() > MAX_ERROR_MESSAGE_LEN {
                let cut = (0..=MAX_ERROR_MESSAGE_LEN).rev().find(|&i| message.is_char_boundary(i)).unwrap_or(0);
                message.truncate(cut);
            }
            ApiError::Client { status: code, message }
        }
    }
}

/// The wait the server asked for, from `Retry-After` or from an exhausted primary quota.
fn retry_after_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(secs));
    }

    let rate_limit = extract_rate_limit_from_headers(headers)?;
    if rate_limit.remaining > 0 {
        return None;
    }

    Some((rate_limit.reset_at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;

    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

/// Target of the `rel="next"` entry of a `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;

    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params.split(';').any(|p| p.trim() == r#"rel="next""#);
        is_next.then(|| target.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    })
}

//! Collection of repository activity from the GitHub API
//!
//! This module gathers everything the metric calculators consume: open and recently
//! closed issues and pull requests with their comments and reviews, default-branch
//! commits, per-pull-request changed files, and repository counters.
//!
//! # Implementation Model
//!
//! Every remote call goes through [`resilient_http::with_retry`], which masks transient
//! failures (rate limiting, timeouts, 5xx responses) with exponential backoff and surfaces
//! everything else as a typed [`ApiError`].
//!
//! Listings are walked page by page with [`pagination::collect_pages`]: each page source is
//! a function from a cursor to a [`Page`], and one driver loop decides when to stop, either
//! because the listing is exhausted or because it has gone past the lookback cutoff.
//!
//! Changed files of merged pull requests are fetched in small paced batches rather than
//! all at once, and a failing listing degrades to an empty one instead of aborting.

mod api_error;
mod client;
mod collector;
mod entities;
mod file_changes;
pub mod pagination;
mod queries;
mod repo_spec;
pub mod resilient_http;

pub use api_error::ApiError;
pub use client::Client;
pub use collector::{COMMIT_WINDOW_WEEKS, Collector, CollectorOptions, DEFAULT_LOOKBACK_DAYS, DEFAULT_PAGE_DELAY, ItemState};
pub use entities::{Activity, Commit, FileChange, Issue, PullRequest, RepoActivity, RepoCounters};
pub use file_changes::{BatchOptions, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, fetch_file_changes, run_batched};
pub use pagination::Page;
pub use repo_spec::RepoSpec;
pub use resilient_http::RetryPolicy;

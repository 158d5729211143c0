//! Changed-file listings for merged pull requests, fetched in paced batches.

use super::{Client, FileChange, RepoSpec};
use core::time::Duration;
use futures_util::future::join_all;

const LOG_TARGET: &str = "     files";

/// Default number of requests in flight at once.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default pause between consecutive batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

/// Run `task` over `items` with at most `batch_size` tasks in flight.
///
/// Each batch is awaited as a whole before the next one starts, with `batch_delay`
/// between batches. Results come back in input order.
pub async fn run_batched<T, R, F, Fut>(items: &[T], options: BatchOptions, mut task: F) -> Vec<R>
where
    F: FnMut(&T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut results = Vec::with_capacity(items.len());
    let mut batches = items.chunks(options.batch_size.max(1)).peekable();

    while let Some(batch) = batches.next() {
        results.extend(join_all(batch.iter().map(&mut task)).await);

        if batches.peek().is_some() {
            tokio::time::sleep(options.batch_delay).await;
        }
    }

    results
}

/// Fetch the changed files of each pull request in `numbers`.
///
/// A pull request whose listing cannot be fetched is logged and reported with no files.
pub async fn fetch_file_changes(client: &Client, repo: &RepoSpec, numbers: &[u64], options: BatchOptions) -> Vec<(u64, Vec<FileChange>)> {
    log::info!(target: LOG_TARGET, "Fetching changed files of {} merged pull request(s) in '{repo}'", numbers.len());

    run_batched(numbers, options, |&number| async move {
        let path = format!("/repos/{}/{}/pulls/{number}/files?per_page=100", repo.owner(), repo.repo());
        match client.get_all_pages::<FileChange>("pull request files", &path).await {
            Ok(files) => (number, files),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch changed files of pull request #{number} in '{repo}': {e}");
                (number, Vec::new())
            }
        }
    })
    .await
}

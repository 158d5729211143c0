//! Cursor-driven page walking.
//!
//! A page source is any function from a cursor to a [`Page`]. [`collect_pages`] owns the
//! accumulation loop and decides after each page whether to keep going, stop because the
//! source is exhausted, or stop because the time-window cutoff has been crossed.

use super::ApiError;
use chrono::{DateTime, Utc};
use core::time::Duration;

const LOG_TARGET: &str = "pagination";

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Items with the timestamp the listing is ordered by.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// What to do after looking at a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Keep the page and fetch the next one.
    Continue,

    /// Keep the page; there is nothing after it.
    Exhausted,

    /// Drop the page and stop: it starts before the cutoff.
    Cutoff,
}

/// Decide what to do with `page`.
///
/// With a cutoff, a page whose first item is older than the cutoff ends the walk and is
/// not used. Only the first item is consulted; listings are requested newest first.
#[must_use]
pub fn classify_page<T: Timestamped>(page: &Page<T>, cutoff: Option<DateTime<Utc>>) -> PageOutcome {
    if let (Some(cutoff), Some(first)) = (cutoff, page.items.first())
        && first.timestamp() < cutoff
    {
        return PageOutcome::Cutoff;
    }

    if page.has_next_page && page.end_cursor.is_some() && !page.items.is_empty() {
        PageOutcome::Continue
    } else {
        PageOutcome::Exhausted
    }
}

/// Walk pages starting at `start`, folding their items into one `Vec`.
///
/// `page_delay` is slept between consecutive page requests, never after the last one.
/// The first error aborts the walk and is returned as is.
pub async fn collect_pages<T, F, Fut>(
    what: &str,
    start: Option<String>,
    cutoff: Option<DateTime<Utc>>,
    page_delay: Duration,
    mut fetch_page: F,
) -> Result<Vec<T>, ApiError>
where
    T: Timestamped,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items: Vec<T> = Vec::new();
    let mut cursor = start;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(cursor.take()).await?;
        pages += 1;

        let outcome = classify_page(&page, cutoff);
        if outcome == PageOutcome::Cutoff {
            log::debug!(target: LOG_TARGET, "{what}: page {pages} starts before the cutoff, stopping with {} item(s)", items.len());
            return Ok(items);
        }

        if cutoff.is_some()
            && let (Some(previous), Some(first)) = (items.last(), page.items.first())
            && first.timestamp() > previous.timestamp()
        {
            log::debug!(target: LOG_TARGET, "{what}: page {pages} is out of order relative to the previous page");
        }

        items.extend(page.items);

        if outcome == PageOutcome::Exhausted {
            log::debug!(target: LOG_TARGET, "{what}: collected {} item(s) from {pages} page(s)", items.len());
            return Ok(items);
        }

        cursor = page.end_cursor;
        tokio::time::sleep(page_delay).await;
    }
}

//! Persisted run results
//!
//! Each run leaves a set of JSON artifacts in the data directory (see [`DataLayout`]):
//! the current metrics of every repository, an append-only registry of everyone who ever
//! contributed, the set of recently active contributors, and one dated snapshot per day.
//!
//! Snapshots accumulate in each repository's `history` directory. Once they pass the
//! retention threshold, [`consolidate_repo`] folds them into one record per calendar month.
//!
//! All artifacts are written atomically and deterministically: the same values always
//! produce the same bytes. Runs that write hold the lock from [`acquire_data_lock`] so that
//! two of them never interleave.

mod consolidation;
mod data_lock;
mod json_file;
mod layout;
mod snapshot;
mod writer;

pub use consolidation::{DEFAULT_RETENTION_DAYS, MonthRollup, consolidate_repo};
pub use data_lock::{DataLockGuard, LOCK_FILE_NAME, acquire_data_lock};
pub use json_file::{read_json, to_pretty_json, write_json};
pub use layout::{DataLayout, HistoryFile, Month};
pub use snapshot::{ContributorSnapshot, IssueSnapshot, PullSnapshot, RepoSnapshot, Snapshot, SnapshotKind, SnapshotMetrics, fold_snapshots};
pub use writer::{RepoIndexEntry, SnapshotWriter};

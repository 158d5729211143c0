#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for repo-pulse
//!
//! This library consolidates all functionality for the repo-pulse tool, which tracks the
//! health of GitHub repositories: how quickly maintainers respond, how stale the backlog is,
//! whether contributors stick around, and which files change the most.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`facts`]: Paginated, rate-limit aware collection of repository activity
//! - [`identity`]: Bot and maintainer recognition
//! - [`metrics`]: Pure metric calculators over collected activity
//! - [`store`]: Snapshot persistence and retention consolidation
//! - [`pipeline`]: Per-repository collect → compute → persist flow

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;

#[must_use]
pub fn hash_set_with_capacity<T>(capacity: usize) -> HashSet<T> {
    HashSet::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
}

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod facts;
pub mod identity;
pub mod metrics;
pub mod pipeline;
pub mod store;

pub use crate::commands::{Host, run};

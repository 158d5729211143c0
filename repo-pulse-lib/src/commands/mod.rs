//! Command-line interface and orchestration for repo-pulse
//!
//! This module implements the CLI commands and wires the collection, metric and storage
//! layers together. It handles argument parsing, configuration management, and the
//! high-level workflows.
//!
//! # Implementation Model
//!
//! ## Commands
//!
//! - **collect**: Collect activity for the configured repositories (or a single `--repo`),
//!   compute health metrics, and persist the metrics, contributor registry and today's
//!   snapshot. With `--dry-run` the metrics are printed instead of written.
//! - **consolidate**: Fold daily snapshots older than the retention threshold into
//!   monthly records
//! - **init**: Generate a default configuration file
//! - **validate**: Check configuration file syntax and values
//!
//! ## Execution Flow
//!
//! The `run` function parses command-line arguments using clap and routes to the
//! appropriate command handler. `collect` follows this pattern:
//!
//! 1. Set up logging and load configuration
//! 2. Load the maintainer registry and build the identity matcher
//! 3. Take the data directory lock
//! 4. Run every repository through the [`Pipeline`](crate::pipeline::Pipeline)
//! 5. Report results, optionally consolidating history afterwards
//!
//! All console output goes through the [`Host`] trait so commands can be exercised
//! with in-memory buffers.

mod collect;
mod common;
mod config;
mod consolidate;
mod host;
mod init;
mod run;
mod validate;

#[cfg(debug_assertions)]
pub use config::Config;

pub use collect::{CollectArgs, collect_metrics};
pub use consolidate::{ConsolidateArgs, consolidate_history};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};

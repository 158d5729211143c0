//! Per-repository collect → compute → persist flow.
//!
//! Repositories are processed strictly one after another. Each one is collected,
//! turned into metrics against the contributor history left by the previous run, and
//! (unless this is a dry run) persisted.

use crate::Result;
use crate::facts::{Collector, RepoSpec};
use crate::identity::IdentityMatcher;
use crate::metrics::{RepoMetrics, compute_repo_metrics};
use crate::store::{RepoIndexEntry, SnapshotWriter};
use chrono::{DateTime, Utc};
use ohno::{AppError, EnrichableExt, IntoAppError};

const LOG_TARGET: &str = "  pipeline";

/// A repository to process, with the name to show for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub spec: RepoSpec,
    pub display_name: Option<String>,
}

impl RepoTarget {
    #[must_use]
    pub const fn new(spec: RepoSpec, display_name: Option<String>) -> Self {
        Self { spec, display_name }
    }
}

/// What happened to each repository of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: Vec<RepoMetrics>,
    pub failed: Vec<(RepoSpec, AppError)>,

    /// Repositories never attempted because an earlier one failed.
    pub skipped: Vec<RepoSpec>,
}

impl RunSummary {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct Pipeline {
    collector: Collector,
    identity: IdentityMatcher,
    writer: SnapshotWriter,
    dry_run: bool,
}

impl Pipeline {
    /// With `dry_run`, history is read but nothing is written.
    #[must_use]
    pub const fn new(collector: Collector, identity: IdentityMatcher, writer: SnapshotWriter, dry_run: bool) -> Self {
        Self {
            collector,
            identity,
            writer,
            dry_run,
        }
    }

    /// Collect, compute and persist one repository.
    pub async fn process_repo(&self, target: &RepoTarget, now: DateTime<Utc>) -> Result<RepoMetrics> {
        let repo = &target.spec;

        let history = self.writer.load_history(repo, &self.identity)?;
        let activity = self
            .collector
            .collect(repo, now)
            .await
            .into_app_err_with(|| format!("collecting activity for '{repo}'"))?;

        let (metrics, next_history) = compute_repo_metrics(repo, &activity, &self.identity, &history, now);

        if self.dry_run {
            log::info!(target: LOG_TARGET, "Dry run: not saving metrics for '{repo}'");
        } else {
            self.writer.write_repo(repo, &metrics, &next_history, &self.identity)?;
            self.writer
                .update_index([RepoIndexEntry::new(repo, target.display_name.as_deref())])?;
        }

        Ok(metrics)
    }

    /// Process `targets` in order.
    ///
    /// The first failure ends the run unless `keep_going` is set, in which case it is
    /// recorded and the remaining repositories are still processed.
    pub async fn run(&self, targets: &[RepoTarget], keep_going: bool, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();

        for (index, target) in targets.iter().enumerate() {
            log::info!(target: LOG_TARGET, "Processing '{}' ({}/{})", target.spec, index + 1, targets.len());

            match self.process_repo(target, now).await {
                Ok(metrics) => summary.completed.push(metrics),
                Err(e) => {
                    let e = e.enrich_with(|| format!("processing repository '{}'", target.spec));
                    log::error!(target: LOG_TARGET, "{e:#}");
                    summary.failed.push((target.spec.clone(), e));

                    if !keep_going {
                        summary.skipped = targets[index + 1..].iter().map(|t| t.spec.clone()).collect();
                        break;
                    }
                }
            }
        }

        summary
    }
}

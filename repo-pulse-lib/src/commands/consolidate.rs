use super::Host;
use super::common::{LoggingArgs, StoreArgs, describe_data_dir, init_logging};
use crate::Result;
use crate::facts::RepoSpec;
use crate::store::{DataLayout, SnapshotWriter, acquire_data_lock, consolidate_repo};
use chrono::{DateTime, Utc};
use clap::Parser;
use ohno::EnrichableExt;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ConsolidateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Fold daily snapshots older than this many days (overrides the configuration)
    #[arg(long, value_name = "DAYS")]
    pub retention_days: Option<u32>,

    /// Consolidate only this repository (OWNER/NAME)
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<RepoSpec>,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

pub async fn consolidate_history<H: Host>(host: &mut H, args: &ConsolidateArgs) -> Result<()> {
    init_logging(&args.logging);

    let config = args.store.load_config()?;
    let retention_days = args.retention_days.unwrap_or(config.retention_days);
    let writer = SnapshotWriter::new(DataLayout::new(config.data_dir.clone()));

    let repos = if let Some(repo) = &args.repo {
        vec![repo.clone()]
    } else {
        let configured: Vec<RepoSpec> = config.repo_targets()?.into_iter().map(|t| t.spec).collect();
        if configured.is_empty() { writer.indexed_repos()? } else { configured }
    };

    let _ = writeln!(host.output(), "{}", describe_data_dir(&config.data_dir, args.store.dry_run));

    let _lock = if args.store.dry_run {
        None
    } else {
        Some(acquire_data_lock(&config.data_dir).await?)
    };

    consolidate_all(host, writer.layout(), &repos, retention_days, Utc::now(), args.store.dry_run)
}

/// Consolidate the history of every repository in `repos`, reporting what was folded.
pub fn consolidate_all<H: Host>(
    host: &mut H,
    layout: &DataLayout,
    repos: &[RepoSpec],
    retention_days: u32,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<()> {
    let verb = if dry_run { "Would fold" } else { "Folded" };

    for repo in repos {
        let rollups = consolidate_repo(layout, repo, retention_days, now, dry_run)
            .map_err(|e| e.enrich_with(|| format!("consolidating history of '{repo}'")))?;

        if rollups.is_empty() {
            let _ = writeln!(host.output(), "{repo}: nothing older than {retention_days} days");
        }

        for rollup in rollups {
            let _ = writeln!(
                host.output(),
                "{repo}: {verb} {} daily snapshot(s) into {} ({} day(s) total)",
                rollup.dailies,
                rollup.month,
                rollup.days
            );
        }
    }

    Ok(())
}

use super::Host;
use super::common::{LoggingArgs, StoreArgs, describe_data_dir, init_logging, require_token};
use super::config::Config;
use super::consolidate::consolidate_all;
use crate::Result;
use crate::facts::{Client, Collector, RepoSpec};
use crate::identity::{Maintainer, load_maintainers};
use crate::metrics::RepoMetrics;
use crate::pipeline::{Pipeline, RepoTarget, RunSummary};
use crate::store::{DataLayout, SnapshotWriter, acquire_data_lock, to_pretty_json};
use chrono::Utc;
use clap::Parser;
use ohno::{app_err, bail};
use std::io::Write;

const LOG_TARGET: &str = "   collect";

#[derive(Parser, Debug)]
pub struct CollectArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Collect only this repository (OWNER/NAME or URL), ignoring the configured list
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<RepoSpec>,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Carry on with the remaining repositories when one fails
    #[arg(long)]
    pub keep_going: bool,

    /// Fold old daily snapshots into monthly records after collecting
    #[arg(long)]
    pub consolidate: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

fn select_targets(config: &Config, repo: Option<&RepoSpec>) -> Result<Vec<RepoTarget>> {
    let configured = config.repo_targets()?;

    if let Some(repo) = repo {
        let display_name = configured.into_iter().find(|t| &t.spec == repo).and_then(|t| t.display_name);
        return Ok(vec![RepoTarget::new(repo.clone(), display_name)]);
    }

    if configured.is_empty() {
        bail!("no repositories to collect: add [[repos]] entries to the configuration or pass --repo");
    }

    Ok(configured)
}

async fn maintainers(config: &Config, client: &Client) -> Result<Option<Vec<Maintainer>>> {
    match &config.maintainer_registry {
        Some(source) => Ok(Some(load_maintainers(source, &config.maintainer_role_suffixes, client).await?)),
        None => {
            log::warn!(
                target: LOG_TARGET,
                "No maintainer_registry configured; every item will count as lacking a maintainer response"
            );
            Ok(None)
        }
    }
}

fn describe(metrics: &RepoMetrics) -> String {
    let issues = &metrics.issues;
    let pulls = &metrics.pull_requests;
    let contributors = &metrics.contributors;

    format!(
        "{}\n  issues: {} open, {} waiting over 7 days for a maintainer, median first response {:.1}h\n  \
         pull requests: {} open, {} merged in 30 days, median merge time {:.1}h\n  \
         contributors: {} active in 30 days, {} first-time, retention {:.0}% ({})",
        metrics.repository,
        issues.open,
        issues.without_response_7d,
        issues.response_time.median_hours,
        pulls.open,
        pulls.merged.last_30_days,
        pulls.merge_time.median_hours,
        contributors.active_30d,
        contributors.first_time,
        contributors.retention.rate * 100.0,
        contributors.retention.basis,
    )
}

fn report<H: Host>(host: &mut H, summary: &RunSummary, dry_run: bool) -> Result<()> {
    for metrics in &summary.completed {
        let _ = writeln!(host.output(), "{}", describe(metrics));
        if dry_run {
            let _ = write!(host.output(), "{}", to_pretty_json(metrics)?);
        }
    }

    for (repo, e) in &summary.failed {
        let _ = writeln!(host.error(), "Could not collect '{repo}': {e:#}");
    }

    if !summary.skipped.is_empty() {
        let _ = writeln!(
            host.error(),
            "Skipped {} remaining repositories after the failure; pass --keep-going to continue past failures",
            summary.skipped.len()
        );
    }

    Ok(())
}

pub async fn collect_metrics<H: Host>(host: &mut H, args: &CollectArgs) -> Result<()> {
    init_logging(&args.logging);

    let config = args.store.load_config()?;
    let token = require_token(args.github_token.as_deref())?;
    let targets = select_targets(&config, args.repo.as_ref())?;
    let dry_run = args.store.dry_run;

    let client = Client::new(token, &config.api_url, config.retry_policy())?;
    let maintainers = maintainers(&config, &client).await?;
    let logins: Vec<&str> = maintainers.iter().flatten().map(|m| m.login.as_str()).collect();
    let identity = config.identity(&logins)?;

    let writer = SnapshotWriter::new(DataLayout::new(config.data_dir.clone()));
    let _ = writeln!(host.output(), "{}", describe_data_dir(&config.data_dir, dry_run));

    let _lock = if dry_run {
        None
    } else {
        Some(acquire_data_lock(&config.data_dir).await?)
    };

    let now = Utc::now();
    if !dry_run && let Some(maintainers) = &maintainers {
        writer.write_maintainers(maintainers, now)?;
    }

    let pipeline = Pipeline::new(
        Collector::new(client, config.collector_options()),
        identity,
        writer.clone(),
        dry_run,
    );
    let summary = pipeline.run(&targets, args.keep_going, now).await;

    report(host, &summary, dry_run)?;

    if args.consolidate {
        let collected: Vec<RepoSpec> = summary.completed.iter().filter_map(|m| m.repository.parse().ok()).collect();
        consolidate_all(host, writer.layout(), &collected, config.retention_days, now, dry_run)?;
    }

    if summary.is_success() {
        Ok(())
    } else {
        Err(app_err!("{} of {} repositories failed", summary.failed.len(), targets.len()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::commands::config::RepoConfig;

    fn config_with(repos: &[(&str, &str, Option<&str>)]) -> Config {
        Config {
            repos: repos
                .iter()
                .map(|(owner, name, display)| RepoConfig {
                    owner: (*owner).into(),
                    name: (*name).into(),
                    display_name: display.map(Into::into),
                })
                .collect(),
            ..Config::default()
        }
    }

    #[test]
    fn repo_override_keeps_configured_display_name() {
        let config = config_with(&[("octo", "widgets", Some("Widgets")), ("acme", "gadgets", None)]);
        let repo: RepoSpec = "octo/widgets".parse().unwrap();

        let targets = select_targets(&config, Some(&repo)).unwrap();

        assert_eq!(targets, vec![RepoTarget::new(repo, Some("Widgets".into()))]);
    }

    #[test]
    fn repo_override_bypasses_the_list() {
        let config = config_with(&[("octo", "widgets", None)]);
        let repo: RepoSpec = "acme/gadgets".parse().unwrap();

        let targets = select_targets(&config, Some(&repo)).unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].spec, repo);
        assert_eq!(targets[0].display_name, None);
    }

    #[test]
    fn nothing_to_collect_is_an_error() {
        let _ = select_targets(&Config::default(), None).unwrap_err();
    }
}

use super::json_file::{read_json, write_json};
use super::layout::DataLayout;
use super::snapshot::Snapshot;
use crate::Result;
use crate::facts::RepoSpec;
use crate::identity::{IdentityMatcher, Maintainer};
use crate::metrics::{ContributorHistory, RepoMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const LOG_TARGET: &str = "     store";

/// Length of the period covered by `active_contributors.json`.
const ACTIVE_PERIOD_DAYS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ContributorRegistryFile {
    updated_at: DateTime<Utc>,
    count: u64,
    contributors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ActiveContributorsFile {
    updated_at: DateTime<Utc>,
    period_days: u64,
    contributors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MaintainersFile {
    updated_at: DateTime<Utc>,
    maintainers: Vec<Maintainer>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoIndexEntry {
    pub owner: String,
    pub name: String,
    pub display_name: String,

    /// Directory of the repository's artifacts, relative to the data directory.
    pub path: String,
}

impl RepoIndexEntry {
    #[must_use]
    pub fn new(repo: &RepoSpec, display_name: Option<&str>) -> Self {
        Self {
            owner: repo.owner().to_string(),
            name: repo.repo().to_string(),
            display_name: display_name.map_or_else(|| repo.to_string(), ToString::to_string),
            path: DataLayout::relative_repo_dir(repo),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RepoIndexFile {
    repos: Vec<RepoIndexEntry>,
}

/// Persists run results under a [`DataLayout`].
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    layout: DataLayout,
}

impl SnapshotWriter {
    #[must_use]
    pub const fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub const fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Read the contributor registry of `repo`, dropping any bot accounts it holds.
    pub fn load_registry(&self, repo: &RepoSpec, identity: &IdentityMatcher) -> Result<BTreeSet<String>> {
        let path = self.layout.contributors(repo);
        let Some(file) = read_json::<ContributorRegistryFile>(&path)? else {
            return Ok(BTreeSet::new());
        };

        let before = file.contributors.len();
        let registry: BTreeSet<String> = file.contributors.into_iter().filter(|login| !identity.is_bot(login)).collect();

        let pruned = before - registry.len();
        if pruned > 0 {
            log::info!(target: LOG_TARGET, "Pruned {pruned} bot account(s) from the contributor registry of {repo}");
        }

        Ok(registry)
    }

    /// State carried over from the previous run of `repo`.
    pub fn load_history(&self, repo: &RepoSpec, identity: &IdentityMatcher) -> Result<ContributorHistory> {
        let registry = self.load_registry(repo, identity)?;
        let prior_active = read_json::<ActiveContributorsFile>(&self.layout.active_contributors(repo))?
            .map(|file| file.contributors.into_iter().filter(|login| !identity.is_bot(login)).collect());

        Ok(ContributorHistory { registry, prior_active })
    }

    /// Write every per-repository artifact of one run.
    ///
    /// The current metrics replace the previous ones, the contributor registry is merged
    /// with what is on disk, and the day's snapshot is written, replacing an earlier one
    /// from the same day.
    pub fn write_repo(
        &self,
        repo: &RepoSpec,
        metrics: &RepoMetrics,
        history: &ContributorHistory,
        identity: &IdentityMatcher,
    ) -> Result<()> {
        let now = metrics.generated_at;

        write_json(&self.layout.metrics(repo), metrics)?;

        let mut registry = self.load_registry(repo, identity)?;
        registry.extend(history.registry.iter().cloned());
        write_json(
            &self.layout.contributors(repo),
            &ContributorRegistryFile {
                updated_at: now,
                count: registry.len() as u64,
                contributors: registry.into_iter().collect(),
            },
        )?;

        if let Some(active) = &history.prior_active {
            write_json(
                &self.layout.active_contributors(repo),
                &ActiveContributorsFile {
                    updated_at: now,
                    period_days: ACTIVE_PERIOD_DAYS,
                    contributors: active.iter().cloned().collect(),
                },
            )?;
        }

        let snapshot = Snapshot::daily(metrics);
        write_json(&self.layout.daily_snapshot(repo, now.date_naive()), &snapshot)?;

        log::info!(target: LOG_TARGET, "Saved metrics and snapshot {} for {repo}", snapshot.period);
        Ok(())
    }

    pub fn write_maintainers(&self, maintainers: &[Maintainer], now: DateTime<Utc>) -> Result<()> {
        let mut maintainers = maintainers.to_vec();
        maintainers.sort_by(|a, b| a.login.cmp(&b.login));

        write_json(
            &self.layout.maintainers(),
            &MaintainersFile {
                updated_at: now,
                maintainers,
            },
        )
    }

    /// Repositories recorded in the index by earlier runs.
    pub fn indexed_repos(&self) -> Result<Vec<RepoSpec>> {
        let index = read_json::<RepoIndexFile>(&self.layout.repos_index())?.unwrap_or_default();
        index.repos.iter().map(|e| RepoSpec::new(&e.owner, &e.name)).collect()
    }

    /// Add or refresh `entries` in the repository index, keeping repositories collected
    /// by earlier runs.
    pub fn update_index(&self, entries: impl IntoIterator<Item = RepoIndexEntry>) -> Result<()> {
        let path = self.layout.repos_index();
        let mut index = read_json::<RepoIndexFile>(&path)?.unwrap_or_default();

        for entry in entries {
            index.repos.retain(|e| !(e.owner == entry.owner && e.name == entry.name));
            index.repos.push(entry);
        }
        index.repos.sort();

        write_json(&path, &index)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::facts::RepoActivity;
    use crate::metrics::compute_repo_metrics;
    use camino::Utf8PathBuf;

    fn writer() -> (tempfile::TempDir, SnapshotWriter) {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        (tmp, SnapshotWriter::new(DataLayout::new(root)))
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn identity() -> IdentityMatcher {
        IdentityMatcher::with_default_bots(["alice"]).unwrap()
    }

    fn metrics(repo: &RepoSpec, history: &ContributorHistory) -> (RepoMetrics, ContributorHistory) {
        compute_repo_metrics(repo, &RepoActivity::default(), &identity(), history, now())
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn registry_is_merged_with_disk() {
        let (_tmp, writer) = writer();
        let repo: RepoSpec = "octo/widgets".parse().unwrap();
        let identity = identity();

        let first = ContributorHistory {
            registry: ["carol".to_string(), "dave".to_string()].into(),
            prior_active: None,
        };
        let (m, _) = metrics(&repo, &first);
        writer.write_repo(&repo, &m, &first, &identity).unwrap();

        let second = ContributorHistory {
            registry: ["erin".to_string()].into(),
            prior_active: Some(["erin".to_string()].into()),
        };
        writer.write_repo(&repo, &m, &second, &identity).unwrap();

        let history = writer.load_history(&repo, &identity).unwrap();
        let registry: Vec<_> = history.registry.iter().map(String::as_str).collect();
        assert_eq!(registry, vec!["carol", "dave", "erin"]);
        assert_eq!(history.prior_active, Some(["erin".to_string()].into()));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn bots_on_disk_are_pruned() {
        let (_tmp, writer) = writer();
        let repo: RepoSpec = "octo/widgets".parse().unwrap();
        let path = writer.layout().contributors(&repo);

        write_json(
            &path,
            &ContributorRegistryFile {
                updated_at: now(),
                count: 2,
                contributors: vec!["carol".into(), "dependabot[bot]".into()],
            },
        )
        .unwrap();

        let registry = writer.load_registry(&repo, &identity()).unwrap();
        assert_eq!(registry.into_iter().collect::<Vec<_>>(), vec!["carol".to_string()]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn same_day_rerun_is_byte_identical() {
        let (_tmp, writer) = writer();
        let repo: RepoSpec = "octo/widgets".parse().unwrap();
        let identity = identity();
        let history = ContributorHistory::default();
        let (m, _) = metrics(&repo, &history);

        writer.write_repo(&repo, &m, &history, &identity).unwrap();
        let path = writer.layout().daily_snapshot(&repo, now().date_naive());
        let first = std::fs::read(&path).unwrap();

        writer.write_repo(&repo, &m, &history, &identity).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        let entries = std::fs::read_dir(writer.layout().history_dir(&repo)).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn index_keeps_earlier_repositories() {
        let (_tmp, writer) = writer();
        let widgets: RepoSpec = "octo/widgets".parse().unwrap();
        let gadgets: RepoSpec = "acme/gadgets".parse().unwrap();

        writer.update_index([RepoIndexEntry::new(&widgets, Some("Widgets"))]).unwrap();
        writer.update_index([RepoIndexEntry::new(&gadgets, None)]).unwrap();
        writer.update_index([RepoIndexEntry::new(&widgets, Some("Widgets v2"))]).unwrap();

        let index = read_json::<RepoIndexFile>(&writer.layout().repos_index()).unwrap().unwrap();
        assert_eq!(index.repos.len(), 2);
        assert_eq!(index.repos[0].display_name, "acme/gadgets");
        assert_eq!(index.repos[1].display_name, "Widgets v2");
        assert_eq!(index.repos[1].path, "octo/widgets");

        let repos: Vec<_> = writer.indexed_repos().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(repos, vec!["acme/gadgets", "octo/widgets"]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn maintainers_are_sorted() {
        let (_tmp, writer) = writer();
        let maintainers = vec![
            Maintainer {
                login: "zoe".into(),
                roles: vec!["CORE_MAINTAINERS".into()],
            },
            Maintainer {
                login: "alice".into(),
                roles: vec!["PY_SDK".into()],
            },
        ];

        writer.write_maintainers(&maintainers, now()).unwrap();

        let file = read_json::<MaintainersFile>(&writer.layout().maintainers()).unwrap().unwrap();
        assert_eq!(file.maintainers[0].login, "alice");
        assert_eq!(file.updated_at, now());
    }
}

use crate::facts::RepoSpec;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, NaiveDate};

/// Where every artifact lives below the data directory.
///
/// ```text
/// <root>/repos.json
/// <root>/maintainers.json
/// <root>/<owner>/<repo>/metrics.json
/// <root>/<owner>/<repo>/contributors.json
/// <root>/<owner>/<repo>/active_contributors.json
/// <root>/<owner>/<repo>/history/YYYY-MM-DD.json
/// <root>/<owner>/<repo>/history/YYYY-MM.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: Utf8PathBuf,
}

impl DataLayout {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    #[must_use]
    pub fn repos_index(&self) -> Utf8PathBuf {
        self.root.join("repos.json")
    }

    #[must_use]
    pub fn maintainers(&self) -> Utf8PathBuf {
        self.root.join("maintainers.json")
    }

    /// Repository directory relative to the root, as recorded in the index.
    #[must_use]
    pub fn relative_repo_dir(repo: &RepoSpec) -> String {
        format!("{}/{}", repo.owner(), repo.repo())
    }

    #[must_use]
    pub fn repo_dir(&self, repo: &RepoSpec) -> Utf8PathBuf {
        self.root.join(repo.owner()).join(repo.repo())
    }

    #[must_use]
    pub fn metrics(&self, repo: &RepoSpec) -> Utf8PathBuf {
        self.repo_dir(repo).join("metrics.json")
    }

    #[must_use]
    pub fn contributors(&self, repo: &RepoSpec) -> Utf8PathBuf {
        self.repo_dir(repo).join("contributors.json")
    }

    #[must_use]
    pub fn active_contributors(&self, repo: &RepoSpec) -> Utf8PathBuf {
        self.repo_dir(repo).join("active_contributors.json")
    }

    #[must_use]
    pub fn history_dir(&self, repo: &RepoSpec) -> Utf8PathBuf {
        self.repo_dir(repo).join("history")
    }

    #[must_use]
    pub fn daily_snapshot(&self, repo: &RepoSpec, date: NaiveDate) -> Utf8PathBuf {
        self.history_dir(repo).join(daily_file_name(date))
    }
}

/// A calendar month, used to key monthly rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl core::fmt::Display for Month {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[must_use]
pub fn daily_file_name(date: NaiveDate) -> String {
    format!("{}.json", date.format("%Y-%m-%d"))
}

#[must_use]
pub fn monthly_file_name(month: Month) -> String {
    format!("{month}.json")
}

/// Recognize a history file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFile {
    Daily(NaiveDate),
    Monthly(Month),
}

impl HistoryFile {
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".json")?;
        match stem.len() {
            10 => NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok().map(Self::Daily),
            7 => {
                let (year, month) = stem.split_once('-')?;
                if year.len() != 4 || month.len() != 2 {
                    return None;
                }
                let year: i32 = year.parse().ok()?;
                let month: u32 = month.parse().ok()?;
                (1..=12).contains(&month).then_some(Self::Monthly(Month { year, month }))
            }
            _ => None,
        }
    }
}

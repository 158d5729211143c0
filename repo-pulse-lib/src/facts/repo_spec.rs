use crate::Result;
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use ohno::{IntoAppError, bail};
use std::sync::Arc;
use url::Url;

/// An `owner/name` repository coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoSpec {
    owner: Arc<str>,
    repo: Arc<str>,
}

fn is_valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl RepoSpec {
    pub fn new(owner: &str, repo: &str) -> Result<Self> {
        let repo = repo.trim_end_matches(".git");

        if !is_valid_segment(owner) {
            bail!("invalid repository owner '{owner}'");
        }

        if !is_valid_segment(repo) {
            bail!("invalid repository name '{repo}'");
        }

        Ok(Self {
            owner: Arc::from(owner),
            repo: Arc::from(repo),
        })
    }

    /// Parse a web URL such as `https://github.com/owner/repo/tree/main`.
    pub fn from_url(url: &Url) -> Result<Self> {
        let path_segments: Vec<_> = url.path_segments().map(Iterator::collect).unwrap_or_default();

        if path_segments.len() < 2 {
            bail!("invalid repository URL format: {url}");
        }

        Self::new(path_segments[0], path_segments[1])
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Accepts `owner/name` or a repository URL.
    pub fn parse_spec(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.contains("://") {
            let url = Url::parse(s).into_app_err_with(|| format!("parsing repository URL '{s}'"))?;
            return Self::from_url(&url);
        }

        let Some((owner, repo)) = s.split_once('/') else {
            bail!("invalid repository '{s}': expected OWNER/NAME");
        };

        Self::new(owner, repo)
    }
}

impl FromStr for RepoSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        Self::parse_spec(s).map_err(|e| e.to_string())
    }
}

impl Display for RepoSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

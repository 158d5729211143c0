use crate::Result;
use crate::facts::resilient_http::{DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_BASE_DELAY};
use crate::facts::{
    BatchOptions, CollectorOptions, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_LOOKBACK_DAYS, DEFAULT_PAGE_DELAY, RepoSpec, RetryPolicy,
};
use crate::identity::{DEFAULT_BOT_PATTERNS, DEFAULT_ROLE_SUFFIXES, IdentityMatcher};
use crate::pipeline::RepoTarget;
use crate::store::DEFAULT_RETENTION_DAYS;
use crate::{HashSet, hash_set_with_capacity};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, app_err, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Configuration file looked for in the current directory when none is named.
pub const DEFAULT_CONFIG_FILE: &str = "repo-pulse.toml";

const LOG_TARGET: &str = "    config";

const DEFAULT_API_URL: &str = "https://api.github.com";

const MAX_LOOKBACK_DAYS: u32 = 3650;
const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    pub owner: String,
    pub name: String,

    /// Name shown in the repository index; defaults to `owner/name`
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding all persisted artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: Utf8PathBuf,

    /// Base URL of the GitHub API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// URL or file path of the maintainer role registry
    #[serde(default)]
    pub maintainer_registry: Option<String>,

    /// Role suffixes that make an account a maintainer
    #[serde(default = "default_role_suffixes")]
    pub maintainer_role_suffixes: Vec<String>,

    /// Regular expressions recognizing bot accounts
    #[serde(default = "default_bot_patterns")]
    pub bot_patterns: Vec<String>,

    /// Days of closed issues and pull requests to collect
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Age in days after which daily snapshots are folded into monthly ones
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_page_delay", with = "humantime_serde")]
    pub page_delay: Duration,

    #[serde(default = "default_file_batch_size")]
    pub file_batch_size: usize,

    #[serde(default = "default_file_batch_delay", with = "humantime_serde")]
    pub file_batch_delay: Duration,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay", with = "humantime_serde")]
    pub retry_base_delay: Duration,

    #[serde(default)]
    pub repos: Vec<RepoConfig>,
}

fn default_data_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("data")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_role_suffixes() -> Vec<String> {
    DEFAULT_ROLE_SUFFIXES.iter().map(|s| (*s).to_string()).collect()
}

fn default_bot_patterns() -> Vec<String> {
    DEFAULT_BOT_PATTERNS.iter().map(|s| (*s).to_string()).collect()
}

const fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

const fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

const fn default_page_delay() -> Duration {
    DEFAULT_PAGE_DELAY
}

const fn default_file_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

const fn default_file_batch_delay() -> Duration {
    DEFAULT_BATCH_DELAY
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_retry_base_delay() -> Duration {
    DEFAULT_RETRY_BASE_DELAY
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// An explicitly named file must exist. Otherwise `repo-pulse.toml` in the current
    /// directory is used when present, and the defaults when not.
    pub fn load(config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.to_path_buf(), text)
        } else {
            let path = Utf8PathBuf::from(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!(target: LOG_TARGET, "No '{path}' found, using the default configuration");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        Self::parse(&text).map_err(|e| e.enrich_with(|| format!("loading configuration file '{final_path}'")))
    }

    /// Parse and validate configuration text
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).into_app_err("parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        if output_path.exists() {
            bail!("'{output_path}' already exists");
        }

        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            return Err(app_err!("lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}, got {}", self.lookback_days));
        }

        if self.retention_days == 0 {
            bail!("retention_days must be at least 1");
        }

        if self.file_batch_size == 0 {
            bail!("file_batch_size must be at least 1");
        }

        if self.max_retries > MAX_RETRIES {
            return Err(app_err!("max_retries must be at most {MAX_RETRIES}, got {}", self.max_retries));
        }

        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than zero");
        }

        if url::Url::parse(&self.api_url).is_err() {
            return Err(app_err!("api_url '{}' is not a valid URL", self.api_url));
        }

        if self.maintainer_role_suffixes.iter().any(String::is_empty) {
            bail!("maintainer_role_suffixes must not contain empty suffixes");
        }

        let _ = self.identity(&[] as &[&str])?;
        let _ = self.repo_targets()?;

        Ok(())
    }

    /// Configured repositories, validated and without duplicates
    pub fn repo_targets(&self) -> Result<Vec<RepoTarget>> {
        let mut seen: HashSet<RepoSpec> = hash_set_with_capacity(self.repos.len());
        let mut targets = Vec::with_capacity(self.repos.len());

        for repo in &self.repos {
            let spec = RepoSpec::new(&repo.owner, &repo.name)?;
            if !seen.insert(spec.clone()) {
                return Err(app_err!("repository '{spec}' is listed more than once"));
            }
            targets.push(RepoTarget::new(spec, repo.display_name.clone()));
        }

        Ok(targets)
    }

    /// Identity matcher using the configured bot patterns
    pub fn identity<S: AsRef<str>>(&self, maintainers: &[S]) -> Result<IdentityMatcher> {
        IdentityMatcher::new(&self.bot_patterns, maintainers).map_err(|e| e.enrich("invalid bot_patterns"))
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.retry_base_delay,
            timeout: self.request_timeout,
        }
    }

    #[must_use]
    pub const fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            page_delay: self.page_delay,
            lookback_days: self.lookback_days,
            files: BatchOptions {
                batch_size: self.file_batch_size,
                batch_delay: self.file_batch_delay,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert!(config.repos.is_empty());
        assert!(config.maintainer_registry.is_none());
    }

    #[test]
    fn test_default_config_matches_code_defaults() {
        let config = Config::default();
        assert_eq!(config.lookback_days, DEFAULT_LOOKBACK_DAYS);
        assert_eq!(config.retention_days, DEFAULT_RETENTION_DAYS);
        assert_eq!(config.page_delay, DEFAULT_PAGE_DELAY);
        assert_eq!(config.file_batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.file_batch_delay, DEFAULT_BATCH_DELAY);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.bot_patterns, DEFAULT_BOT_PATTERNS);
    }

    #[test]
    fn test_validate_lookback_out_of_range() {
        let config = Config { lookback_days: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { lookback_days: MAX_LOOKBACK_DAYS + 1, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_retention() {
        let config = Config { retention_days: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let config = Config { file_batch_size: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_too_many_retries() {
        let config = Config { max_retries: 11, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_bot_pattern() {
        let config = Config { bot_patterns: vec!["(unclosed".into()], ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_api_url() {
        let config = Config { api_url: "not a url".into(), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_repos_rejected() {
        let repo = RepoConfig {
            owner: "octo".into(),
            name: "widgets".into(),
            display_name: None,
        };
        let config = Config { repos: vec![repo.clone(), repo], ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_repos_and_durations() {
        let text = format!(
            "{DEFAULT_CONFIG_TOML}\n[[repos]]\nowner = \"octo\"\nname = \"widgets\"\ndisplay_name = \"Widgets\"\n"
        );
        let text = text.replace("page_delay = \"500ms\"", "page_delay = \"2s\"");

        let config = Config::parse(&text).unwrap();

        assert_eq!(config.page_delay, Duration::from_secs(2));
        let targets = config.repo_targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].spec.to_string(), "octo/widgets");
        assert_eq!(targets[0].display_name.as_deref(), Some("Widgets"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("# nothing here\n").unwrap();
        let defaults = Config::default();

        assert_eq!(toml::to_string(&config).unwrap(), toml::to_string(&defaults).unwrap());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = Config::parse("lookback_days = 30\nretry_base_delay = \"250ms\"\n").unwrap();

        assert_eq!(config.lookback_days, 30);
        assert_eq!(config.retry_base_delay, Duration::from_millis(250));
        assert_eq!(config.retention_days, DEFAULT_RETENTION_DAYS);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let _ = Config::parse("page_delay = \"not a duration\"\n").unwrap_err();
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let text = format!("{DEFAULT_CONFIG_TOML}\nsurprise = true\n");
        let _ = Config::parse(&text).unwrap_err();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let output_path = Utf8PathBuf::try_from(tmp.path().join("repo-pulse.toml")).unwrap();
        Config::save_default(&output_path).unwrap();

        let loaded = Config::load(Some(&output_path)).unwrap();
        loaded.validate().unwrap();

        let _ = Config::save_default(&output_path).unwrap_err();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_missing_explicit_config_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("absent.toml")).unwrap();
        let _ = Config::load(Some(&path)).unwrap_err();
    }

    #[test]
    fn test_default_config_toml_is_not_empty() {
        assert!(!DEFAULT_CONFIG_TOML.is_empty());
    }
}

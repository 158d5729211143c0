//! Arguments and setup shared between commands.

use super::config::Config;
use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use ohno::bail;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Logging arguments shared by all commands
#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: LogLevel,

    /// Report progress (same as `--log-level info` unless a more verbose level is given)
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl LoggingArgs {
    #[must_use]
    pub fn effective_level(&self) -> LogLevel {
        match self.log_level {
            LogLevel::None | LogLevel::Error | LogLevel::Warn if self.verbose => LogLevel::Info,
            level => level,
        }
    }
}

/// Arguments locating the configuration and the data directory
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to configuration file (default is `repo-pulse.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding collected data (overrides the configuration)
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<Utf8PathBuf>,

    /// Compute everything but write nothing
    #[arg(long)]
    pub dry_run: bool,
}

impl StoreArgs {
    /// Load the configuration, applying the command-line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(data_dir) = &self.data_dir {
            config.data_dir.clone_from(data_dir);
        }
        Ok(config)
    }
}

/// Initialize logger based on log level
pub fn init_logging(args: &LoggingArgs) {
    let log_level = args.effective_level();
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // A second command in the same process (as in tests) keeps the first logger.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}

/// The GitHub token, which collection cannot do without
pub fn require_token(token: Option<&str>) -> Result<&str> {
    match token.map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => bail!("a GitHub token is required: set GITHUB_TOKEN or pass --github-token"),
    }
}

/// Line naming the data directory a command works on
#[must_use]
pub fn describe_data_dir(data_dir: &Utf8Path, dry_run: bool) -> String {
    if dry_run {
        format!("Dry run: nothing will be written to '{data_dir}'")
    } else {
        format!("Data directory: '{data_dir}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_quiet_levels_to_info() {
        let args = LoggingArgs {
            log_level: LogLevel::Warn,
            verbose: true,
        };
        assert_eq!(args.effective_level(), LogLevel::Info);

        let args = LoggingArgs {
            log_level: LogLevel::Debug,
            verbose: true,
        };
        assert_eq!(args.effective_level(), LogLevel::Debug);

        let args = LoggingArgs {
            log_level: LogLevel::Error,
            verbose: false,
        };
        assert_eq!(args.effective_level(), LogLevel::Error);
    }

    #[test]
    fn token_must_be_present() {
        assert_eq!(require_token(Some(" abc ")).unwrap(), "abc");
        let _ = require_token(Some("  ")).unwrap_err();
        let _ = require_token(None).unwrap_err();
    }

    #[test]
    fn data_dir_override_wins() {
        let args = StoreArgs {
            config: None,
            data_dir: Some(Utf8PathBuf::from("elsewhere")),
            dry_run: false,
        };

        let config = args.load_config().unwrap();

        assert_eq!(config.data_dir, "elsewhere");
    }
}

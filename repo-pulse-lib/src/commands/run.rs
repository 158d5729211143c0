//! Command dispatch logic for repo-pulse

use super::{CollectArgs, ConsolidateArgs, InitArgs, ValidateArgs, collect_metrics, consolidate_history, init_config, validate_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "repo-pulse", author, version, long_about = None)]
#[command(about = "Track the health of GitHub repositories over time")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: PulseSubcommand,
}

#[derive(Subcommand, Debug)]
enum PulseSubcommand {
    /// Collect activity, compute health metrics and record today's snapshot
    Collect(Box<CollectArgs>),
    /// Fold old daily snapshots into monthly records
    Consolidate(Box<ConsolidateArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the corresponding
/// subcommand. It's designed to be called from main.rs with the program arguments.
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        PulseSubcommand::Collect(collect_args) => collect_metrics(host, collect_args).await,
        PulseSubcommand::Consolidate(consolidate_args) => consolidate_history(host, consolidate_args).await,
        PulseSubcommand::Init(init_args) => init_config(host, init_args),
        PulseSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn collect_flags_parse() {
        let cli = Cli::parse_from([
            "repo-pulse",
            "collect",
            "--repo",
            "octo/widgets",
            "--dry-run",
            "--keep-going",
            "--consolidate",
            "-v",
            "--data-dir",
            "out",
            "--github-token",
            "secret",
        ]);

        let PulseSubcommand::Collect(args) = cli.command else {
            panic!("expected the collect command");
        };
        assert_eq!(args.repo.as_ref().map(ToString::to_string).as_deref(), Some("octo/widgets"));
        assert!(args.store.dry_run);
        assert!(args.keep_going);
        assert!(args.consolidate);
        assert!(args.logging.verbose);
        assert_eq!(args.store.data_dir.as_deref().map(camino::Utf8Path::as_str), Some("out"));
        assert_eq!(args.github_token.as_deref(), Some("secret"));
    }

    #[test]
    fn consolidate_flags_parse() {
        let cli = Cli::parse_from(["repo-pulse", "consolidate", "--retention-days", "30", "--dry-run"]);

        let PulseSubcommand::Consolidate(args) = cli.command else {
            panic!("expected the consolidate command");
        };
        assert_eq!(args.retention_days, Some(30));
        assert!(args.store.dry_run);
    }

    #[test]
    fn malformed_repo_flag_is_a_usage_error() {
        let err = Cli::try_parse_from(["repo-pulse", "collect", "--repo", "widgets"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("expected OWNER/NAME"), "{err}");

        let err = Cli::try_parse_from(["repo-pulse", "consolidate", "--repo", "../etc"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn repo_flag_accepts_a_url() {
        let cli = Cli::parse_from(["repo-pulse", "consolidate", "--repo", "https://github.com/octo/widgets"]);

        let PulseSubcommand::Consolidate(args) = cli.command else {
            panic!("expected the consolidate command");
        };
        assert_eq!(args.repo.as_ref().map(ToString::to_string).as_deref(), Some("octo/widgets"));
    }
}

use super::Host;
use super::config::{Config, DEFAULT_CONFIG_FILE};
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `repo-pulse.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

/// Load a configuration file and report whether it is usable
///
/// Loading already checks value ranges, bot patterns and the repository list.
pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    match Config::load(args.config.as_deref()) {
        Ok(config) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            if let Some(path) = &args.config {
                let _ = writeln!(host.output(), "Config file: {path}");
            } else if camino::Utf8Path::new(DEFAULT_CONFIG_FILE).exists() {
                let _ = writeln!(host.output(), "Config file: {DEFAULT_CONFIG_FILE}");
            } else {
                let _ = writeln!(host.output(), "Using default configuration (no config file found)");
            }
            let _ = writeln!(host.output(), "Repositories: {}", config.repos.len());
            if config.maintainer_registry.is_none() {
                let _ = writeln!(host.output(), "No maintainer registry configured");
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}

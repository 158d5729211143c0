//! Maintainer role registry.
//!
//! The registry is a loosely structured text document (for example a JavaScript or TOML
//! source file) holding one `login: [roles]` pair per line. Only the shape of those lines
//! matters; everything else in the document is ignored.

use crate::Result;
use crate::facts::Client;
use ohno::IntoAppError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

const LOG_TARGET: &str = "  identity";

/// Role suffixes that make an account a maintainer when the configuration names none.
pub const DEFAULT_ROLE_SUFFIXES: &[&str] = &["_MAINTAINERS", "_SDK"];

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*["']?([A-Za-z0-9][A-Za-z0-9-]*)["']?\s*[:=]\s*\[([^\]]*)\]"#).expect("registry entry pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub login: String,
    pub roles: Vec<String>,
}

/// Extract every `(login, roles)` pair from a registry document.
///
/// Roles are comma separated with surrounding quotes and whitespace removed. A login
/// appearing more than once accumulates the roles of all its entries.
#[must_use]
pub fn parse_registry(text: &str) -> BTreeMap<String, Vec<String>> {
    let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for captures in ENTRY_PATTERN.captures_iter(text) {
        let login = captures[1].to_string();
        let roles = entries.entry(login).or_default();

        for role in captures[2].split(',') {
            let role = role.trim().trim_matches(|c| c == '"' || c == '\'').trim();
            if !role.is_empty() && !roles.iter().any(|r| r == role) {
                roles.push(role.to_string());
            }
        }
    }

    entries
}

/// Entries holding at least one role that ends with one of `role_suffixes`, sorted by login.
#[must_use]
pub fn select_maintainers(entries: BTreeMap<String, Vec<String>>, role_suffixes: &[String]) -> Vec<Maintainer> {
    entries
        .into_iter()
        .filter(|(_, roles)| roles.iter().any(|role| role_suffixes.iter().any(|s| role.ends_with(s.as_str()))))
        .map(|(login, mut roles)| {
            roles.sort();
            Maintainer { login, roles }
        })
        .collect()
}

/// Read the raw registry from an `http(s)` URL or a local file path.
pub async fn read_registry(source: &str, client: &Client) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        log::info!(target: LOG_TARGET, "Downloading maintainer registry from '{source}'");
        return client
            .get_text("maintainer registry", source)
            .await
            .into_app_err_with(|| format!("downloading maintainer registry from '{source}'"));
    }

    log::info!(target: LOG_TARGET, "Reading maintainer registry from '{source}'");
    tokio::fs::read_to_string(source)
        .await
        .into_app_err_with(|| format!("reading maintainer registry '{source}'"))
}

/// Load and filter the registry at `source`.
///
/// A registry that yields no maintainers is logged and treated as empty, so that metrics
/// can still be computed without maintainer attribution.
pub async fn load_maintainers(source: &str, role_suffixes: &[String], client: &Client) -> Result<Vec<Maintainer>> {
    let text = read_registry(source, client).await?;
    let maintainers = select_maintainers(parse_registry(&text), role_suffixes);

    if maintainers.is_empty() {
        log::warn!(
            target: LOG_TARGET,
            "No maintainers found in registry '{source}'; every item will count as lacking a maintainer response"
        );
    } else {
        log::info!(target: LOG_TARGET, "Loaded {} maintainer(s) from registry", maintainers.len());
    }

    Ok(maintainers)
}

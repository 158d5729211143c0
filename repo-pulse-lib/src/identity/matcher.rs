use crate::{HashSet, Result};
use ohno::IntoAppError;
use regex::{RegexSet, RegexSetBuilder};

/// Bot account patterns used when the configuration names none.
pub const DEFAULT_BOT_PATTERNS: &[&str] = &[
    r"\[bot\]$",
    r"^dependabot",
    r"^renovate",
    r"^github-actions",
    r"-bot$",
    r"^azure-sdk$",
    r"^msftbot$",
];

/// Decides whether an account is a bot or a maintainer.
///
/// Logins are compared case-insensitively, as the hosting service treats them.
#[derive(Debug, Clone)]
pub struct IdentityMatcher {
    bot_patterns: RegexSet,
    maintainers: HashSet<String>,
}

impl IdentityMatcher {
    pub fn new<I, S>(bot_patterns: &[String], maintainers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bot_patterns = RegexSetBuilder::new(bot_patterns)
            .case_insensitive(true)
            .build()
            .into_app_err("compiling bot patterns")?;

        Ok(Self {
            bot_patterns,
            maintainers: maintainers.into_iter().map(|m| m.as_ref().to_ascii_lowercase()).collect(),
        })
    }

    /// A matcher with the default bot patterns and no maintainers.
    pub fn with_default_bots<I, S>(maintainers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = DEFAULT_BOT_PATTERNS.iter().map(|p| (*p).to_string()).collect();
        Self::new(&patterns, maintainers)
    }

    #[must_use]
    pub fn is_bot(&self, login: &str) -> bool {
        self.bot_patterns.is_match(login)
    }

    #[must_use]
    pub fn is_maintainer(&self, login: &str) -> bool {
        self.maintainers.contains(&login.to_ascii_lowercase())
    }

    #[must_use]
    pub fn maintainer_count(&self) -> usize {
        self.maintainers.len()
    }

    /// The login if it belongs to a person rather than a bot or a deleted account.
    #[must_use]
    pub fn human<'a>(&self, login: Option<&'a str>) -> Option<&'a str> {
        login.filter(|l| !self.is_bot(l))
    }

    /// Whether an action by `actor` on an item opened by `item_author` counts as a
    /// maintainer response: the actor is a maintainer, not a bot, and not the item's author.
    #[must_use]
    pub fn is_maintainer_response(&self, actor: Option<&str>, item_author: Option<&str>) -> bool {
        let Some(actor) = self.human(actor) else {
            return false;
        };

        if item_author.is_some_and(|a| a.eq_ignore_ascii_case(actor)) {
            return false;
        }

        self.is_maintainer(actor)
    }
}

//! Recognizing who is behind an account
//!
//! Metrics distinguish three kinds of accounts: bots, whose activity is ignored entirely;
//! maintainers, whose comments and reviews count as responses; and everyone else. Bots
//! are recognized by configurable regular expressions. Maintainers come from an external
//! role registry, where an account is a maintainer if any of its roles carries one of the
//! configured suffixes.

mod maintainers;
mod matcher;

pub use maintainers::{DEFAULT_ROLE_SUFFIXES, Maintainer, load_maintainers, parse_registry, read_registry, select_maintainers};
pub use matcher::{DEFAULT_BOT_PATTERNS, IdentityMatcher};

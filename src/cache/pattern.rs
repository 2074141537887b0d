//! Key patterns used for bulk invalidation.

use regex::Regex;

use crate::error::{CacheError, Result};

/// Selects cache keys for invalidation.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Key contains the string
    Substring(String),
    /// Key starts with the string
    Prefix(String),
    /// Key matches the regular expression
    Regex(Regex),
}

impl KeyPattern {
    pub fn substring(s: impl Into<String>) -> Self {
        KeyPattern::Substring(s.into())
    }

    pub fn prefix(s: impl Into<String>) -> Self {
        KeyPattern::Prefix(s.into())
    }

    /// Compiles `pattern` as a regular expression.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(KeyPattern::Regex)
            .map_err(|err| CacheError::InvalidPattern(err.to_string()))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Substring(s) => key.contains(s.as_str()),
            KeyPattern::Prefix(p) => key.starts_with(p.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(s: &str) -> Self {
        KeyPattern::Substring(s.to_string())
    }
}

impl From<String> for KeyPattern {
    fn from(s: String) -> Self {
        KeyPattern::Substring(s)
    }
}

impl From<Regex> for KeyPattern {
    fn from(re: Regex) -> Self {
        KeyPattern::Regex(re)
    }
}

impl std::fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPattern::Substring(s) => write!(f, "*{s}*"),
            KeyPattern::Prefix(p) => write!(f, "{p}*"),
            KeyPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

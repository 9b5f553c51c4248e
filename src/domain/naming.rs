// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stage Naming Prefix with Validation Invariants
//!
//! Every physical resource name is derived from a [`NamePrefix`], so two
//! stages with different prefixes can never produce the same name.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Naming validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Name prefix is empty")]
    Empty,

    #[error("Name prefix exceeds maximum length of {max} characters: {len}")]
    TooLong { len: usize, max: usize },

    #[error("Invalid character in name prefix: {0:?}")]
    InvalidCharacter(char),

    #[error("Name prefix must start with a lowercase letter: {0}")]
    MustStartWithLetter(String),

    #[error("Name prefix cannot end with or repeat hyphens: {0}")]
    InvalidHyphenation(String),
}

/// Stage naming prefix
///
/// Invariants:
/// - Non-empty, at most 20 characters (so derived names such as load
///   balancer and search domain names stay within provider limits)
/// - Lowercase ASCII letters, digits and single hyphens only
/// - Starts with a letter, does not end with a hyphen
///
/// # Examples
///
/// ```rust
/// use cim_infrastructure_synth::domain::NamePrefix;
///
/// let prefix = NamePrefix::new("pr-124").unwrap();
/// assert_eq!(prefix.qualify("db-instance"), "pr-124-db-instance");
/// assert_eq!(prefix.underscored("db"), "pr_124_db");
/// assert!(NamePrefix::new("-dev").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamePrefix(String);

impl NamePrefix {
    /// Maximum prefix length
    pub const MAX_LENGTH: usize = 20;

    /// Create a new prefix with validation
    pub fn new(prefix: impl Into<String>) -> Result<Self, NameError> {
        let prefix = prefix.into();

        if prefix.is_empty() {
            return Err(NameError::Empty);
        }

        if prefix.len() > Self::MAX_LENGTH {
            return Err(NameError::TooLong {
                len: prefix.len(),
                max: Self::MAX_LENGTH,
            });
        }

        for ch in prefix.chars() {
            if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-') {
                return Err(NameError::InvalidCharacter(ch));
            }
        }

        if !prefix.starts_with(|c: char| c.is_ascii_lowercase()) {
            return Err(NameError::MustStartWithLetter(prefix));
        }

        if prefix.ends_with('-') || prefix.contains("--") {
            return Err(NameError::InvalidHyphenation(prefix));
        }

        Ok(Self(prefix))
    }

    /// Get the prefix as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{prefix}-{suffix}`
    pub fn qualify(&self, suffix: &str) -> String {
        format!("{}-{}", self.0, suffix)
    }

    /// `{prefix}_{suffix}` with hyphens mapped to underscores, for engines
    /// that reject hyphens in identifiers (database names)
    pub fn underscored(&self, suffix: &str) -> String {
        format!("{}_{}", self.0.replace('-', "_"), suffix)
    }

    /// `/aws/{service}/{prefix}/{name}` log group naming
    pub fn log_group(&self, service: &str, name: &str) -> String {
        format!("/aws/{}/{}/{}", service, self.0, name)
    }

    /// Whether a physical name was derived from this prefix
    pub fn owns(&self, name: &str) -> bool {
        name.starts_with(&format!("{}-", self.0))
            || name.starts_with(&format!("{}_", self.0.replace('-', "_")))
            || name.contains(&format!("/{}/", self.0))
    }
}

impl fmt::Display for NamePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NamePrefix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NamePrefix {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NamePrefix {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NamePrefix> for String {
    fn from(prefix: NamePrefix) -> Self {
        prefix.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_prefixes() {
        assert!(NamePrefix::new("dev").is_ok());
        assert!(NamePrefix::new("staging").is_ok());
        assert!(NamePrefix::new("pr-124").is_ok());
        assert!(NamePrefix::new("a").is_ok());
    }

    #[test]
    fn test_invalid_prefixes() {
        assert_eq!(NamePrefix::new(""), Err(NameError::Empty));
        assert!(matches!(
            NamePrefix::new("Dev"),
            Err(NameError::InvalidCharacter('D'))
        ));
        assert!(matches!(
            NamePrefix::new("124"),
            Err(NameError::MustStartWithLetter(_))
        ));
        assert!(matches!(
            NamePrefix::new("pr-"),
            Err(NameError::InvalidHyphenation(_))
        ));
        assert!(matches!(
            NamePrefix::new("pr--1"),
            Err(NameError::InvalidHyphenation(_))
        ));
        assert!(matches!(
            NamePrefix::new("pr_1"),
            Err(NameError::InvalidCharacter('_'))
        ));
        assert!(matches!(
            NamePrefix::new("a".repeat(21)),
            Err(NameError::TooLong { len: 21, max: 20 })
        ));
    }

    #[test]
    fn test_derived_names() {
        let prefix = NamePrefix::new("pr-7").unwrap();
        assert_eq!(prefix.qualify("sg-db"), "pr-7-sg-db");
        assert_eq!(prefix.underscored("db"), "pr_7_db");
        assert_eq!(prefix.log_group("redis", "slow-logs"), "/aws/redis/pr-7/slow-logs");
    }

    #[test]
    fn test_ownership() {
        let dev = NamePrefix::new("dev").unwrap();
        let staging = NamePrefix::new("staging").unwrap();
        assert!(dev.owns(&dev.qualify("alb")));
        assert!(dev.owns(&dev.underscored("db")));
        assert!(dev.owns(&dev.log_group("vpc", "flowlogs")));
        assert!(!staging.owns(&dev.qualify("alb")));
    }
}

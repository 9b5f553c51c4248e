// Copyright (c) 2025 - Cowboy AI, Inc.
//! Logical Identity of a Declared Resource

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Stable in-template identity of a declared resource
///
/// Logical ids are the same for every stage; only physical names carry the
/// stage prefix. Invariants:
/// - Non-empty, at most 255 characters
/// - ASCII alphanumeric only, starting with a letter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalId(String);

impl LogicalId {
    /// Maximum logical id length
    pub const MAX_LENGTH: usize = 255;

    /// Create a logical id with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();

        if id.is_empty()
            || id.len() > Self::MAX_LENGTH
            || !id.chars().all(|c| c.is_ascii_alphanumeric())
            || !id.starts_with(|c: char| c.is_ascii_alphabetic())
        {
            return Err(ValidationError::InvalidLogicalId(id));
        }

        Ok(Self(id))
    }

    /// Join a builder scope and a local name, dropping characters that are
    /// not alphanumeric (`("Network", "Public Subnet 1")` → `NetworkPublicSubnet1`)
    pub fn scoped(scope: &str, name: &str) -> Self {
        let joined: String = scope
            .chars()
            .chain(name.chars())
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        Self(joined)
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for LogicalId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LogicalId> for String {
    fn from(id: LogicalId) -> Self {
        id.0
    }
}

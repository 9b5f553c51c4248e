// Copyright (c) 2025 - Cowboy AI, Inc.
//! Lifecycle Value Objects
//!
//! Removal policy decides what happens to a stateful resource's data on
//! teardown; retention bounds how long log sinks keep their events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Disposition of a resource's data when it is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Delete the resource and its data
    Destroy,
    /// Orphan the resource so its data survives
    Retain,
}

impl RemovalPolicy {
    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Destroy => "destroy",
            Self::Retain => "retain",
        }
    }

    /// Provider `DeletionPolicy` / `UpdateReplacePolicy` value
    pub fn deletion_policy(&self) -> &'static str {
        match self {
            Self::Destroy => "Delete",
            Self::Retain => "Retain",
        }
    }
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "destroy" | "delete" => Ok(Self::Destroy),
            "retain" => Ok(Self::Retain),
            other => Err(format!(
                "unknown removal policy {:?} (expected destroy or retain)",
                other
            )),
        }
    }
}

/// Log retention in days
///
/// Invariant: one of the retention periods the log service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RetentionDays(u32);

impl RetentionDays {
    /// Accepted retention periods
    pub const ALLOWED: [u32; 22] = [
        1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557,
        2922, 3288, 3653,
    ];

    pub const ONE_DAY: RetentionDays = RetentionDays(1);
    pub const ONE_WEEK: RetentionDays = RetentionDays(7);
    pub const ONE_MONTH: RetentionDays = RetentionDays(30);

    /// Create a retention period with validation
    pub fn new(days: u32) -> Result<Self, ValidationError> {
        if !Self::ALLOWED.contains(&days) {
            return Err(ValidationError::InvalidRetention(days));
        }
        Ok(Self(days))
    }

    /// Get the number of days
    pub fn days(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for RetentionDays {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RetentionDays> for u32 {
    fn from(retention: RetentionDays) -> Self {
        retention.0
    }
}

impl fmt::Display for RetentionDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.0)
    }
}

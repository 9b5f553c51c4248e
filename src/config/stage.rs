// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment stages and their fixed per-stage parameters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::RemovalPolicy;

/// Development account
pub const DEVELOPMENT_ACCOUNT: &str = "11111111111";

/// Production account
pub const PRODUCTION_ACCOUNT: &str = "33333333333";

/// Frankfurt
pub const FRANKFURT: &str = "eu-central-1";

/// Deployment stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Ephemeral per-change environment, named after the change id
    FeatureDev,
    /// Shared development
    Dev,
    /// Pre-production
    Staging,
    /// Production
    Prod,
}

impl Stage {
    /// Every stage in the closed set
    pub const ALL: [Stage; 4] = [Stage::FeatureDev, Stage::Dev, Stage::Staging, Stage::Prod];

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeatureDev => "featureDev",
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }

    /// Whether the stage is named by an external change id
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::FeatureDev)
    }

    /// Database removal policy when no override is supplied
    pub fn default_removal_policy(&self) -> RemovalPolicy {
        match self {
            Self::Prod => RemovalPolicy::Retain,
            Self::FeatureDev | Self::Dev | Self::Staging => RemovalPolicy::Destroy,
        }
    }

    pub(crate) fn profile(&self) -> StageProfile {
        match self {
            Self::FeatureDev => StageProfile {
                target: None,
                cidr: "10.0.0.0/16",
                database_instance_class: "t2.micro",
            },
            Self::Dev => StageProfile {
                target: Some((DEVELOPMENT_ACCOUNT, FRANKFURT)),
                cidr: "11.0.0.0/16",
                database_instance_class: "t2.micro",
            },
            Self::Staging => StageProfile {
                target: Some((DEVELOPMENT_ACCOUNT, FRANKFURT)),
                cidr: "12.0.0.0/16",
                database_instance_class: "t2.micro",
            },
            Self::Prod => StageProfile {
                target: Some((PRODUCTION_ACCOUNT, FRANKFURT)),
                cidr: "13.0.0.0/16",
                database_instance_class: "m6i.xlarge",
            },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "featuredev" | "feature-dev" | "feature" => Ok(Self::FeatureDev),
            "dev" | "development" => Ok(Self::Dev),
            "staging" | "stage" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(format!(
                "unknown stage {:?} (expected featureDev, dev, staging or prod)",
                other
            )),
        }
    }
}

/// Values fixed for a stage before external inputs are applied
pub(crate) struct StageProfile {
    /// Account and region, `None` when they come from external input
    pub target: Option<(&'static str, &'static str)>,
    pub cidr: &'static str,
    pub database_instance_class: &'static str,
}

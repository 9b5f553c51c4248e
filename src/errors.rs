// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for stack synthesis

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ValidationError;

/// Synthesis component that raised an error or declared a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Environment configuration resolution
    EnvironmentConfig,
    /// Network topology builder
    Network,
    /// Compute cluster builder
    Compute,
    /// Cache cluster builder
    Cache,
    /// Relational database builder
    Database,
    /// Search domain builder
    Search,
    /// Container service builder
    ContainerService,
    /// Stack composer
    Composer,
    /// Provisioning boundary
    Provisioning,
    /// Template delivery
    Delivery,
}

impl Component {
    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnvironmentConfig => "environment_config",
            Self::Network => "network",
            Self::Compute => "compute",
            Self::Cache => "cache",
            Self::Database => "database",
            Self::Search => "search",
            Self::ContainerService => "container_service",
            Self::Composer => "composer",
            Self::Provisioning => "provisioning",
            Self::Delivery => "delivery",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that abort a synthesis run
///
/// All variants are fatal: no partial graph is handed to the provisioning
/// boundary once one of these has been raised.
#[derive(Debug, Error)]
pub enum SynthError {
    /// A required environment value could not be resolved
    #[error("Configuration error in {component}: {message}")]
    Configuration {
        component: Component,
        message: String,
    },

    /// A structural precondition is violated
    #[error("Validation error in {component}: {source}")]
    Validation {
        component: Component,
        #[source]
        source: ValidationError,
    },

    /// A resource was declared before the upstream attribute it consumes
    #[error("Dependency error in {component}: {message}")]
    Dependency {
        component: Component,
        message: String,
    },

    /// Template serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Delivering a finished template failed
    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl SynthError {
    /// Create a configuration error for a component
    pub fn configuration(component: Component, message: impl Into<String>) -> Self {
        Self::Configuration {
            component,
            message: message.into(),
        }
    }

    /// Create a validation error for a component
    pub fn validation(component: Component, source: impl Into<ValidationError>) -> Self {
        Self::Validation {
            component,
            source: source.into(),
        }
    }

    /// Create a dependency error for a component
    pub fn dependency(component: Component, message: impl Into<String>) -> Self {
        Self::Dependency {
            component,
            message: message.into(),
        }
    }

    /// Component the error originated in, if it belongs to synthesis proper
    pub fn component(&self) -> Option<Component> {
        match self {
            Self::Configuration { component, .. }
            | Self::Validation { component, .. }
            | Self::Dependency { component, .. } => Some(*component),
            Self::Serialization(_) => None,
            Self::Delivery(_) => Some(Component::Delivery),
        }
    }

    /// Whether this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Whether this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether this is a dependency error
    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Dependency { .. })
    }
}

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;

impl From<serde_json::Error> for SynthError {
    fn from(err: serde_json::Error) -> Self {
        SynthError::Serialization(err.to_string())
    }
}

impl From<async_nats::Error> for SynthError {
    fn from(err: async_nats::Error) -> Self {
        SynthError::Delivery(err.to_string())
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Graph Invariants
//!
//! Business rules every synthesized stack must satisfy, expressed as pure
//! functions over the allow-graph, resource placements and physical names.
//!
//! # Invariant Categories
//!
//! 1. **Structural Invariants**: address space, availability zones, ids
//! 2. **Placement Invariants**: stateful services only in the private tier,
//!    the load balancer only in the public tier
//! 3. **Security Invariants**: no "any" source except the public listener,
//!    stateful services reachable only from permitted identities
//! 4. **Naming Invariants**: physical names unique and prefix-qualified

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{IngressRule, LogicalId, NameError, NamePrefix, NetworkError, Peer, PortRange, SubnetTier};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Structural precondition violated during synthesis
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Address range is malformed
    #[error("Invalid address range: {0}")]
    Network(#[from] NetworkError),

    /// Name prefix is malformed
    #[error("Invalid name: {0}")]
    Name(#[from] NameError),

    /// Logical id is malformed
    #[error("Invalid logical id: {0:?}")]
    InvalidLogicalId(String),

    /// Logical id declared twice
    #[error("Logical id declared twice: {0}")]
    DuplicateLogicalId(String),

    /// Physical name used twice
    #[error("Physical name used twice: {0}")]
    DuplicatePhysicalName(String),

    /// Physical name not derived from the stage prefix
    #[error("Physical name {name:?} is not qualified by prefix {prefix:?}")]
    UnqualifiedName { name: String, prefix: String },

    /// No private subnets to place a service in
    #[error("Network has no private subnets")]
    NoPrivateSubnets,

    /// No public subnets to place the load balancer in
    #[error("Network has no public subnets")]
    NoPublicSubnets,

    /// Not enough availability zones
    #[error("At least {required} availability zones required, got {actual}")]
    InsufficientAvailabilityZones { required: usize, actual: usize },

    /// Address space cannot hold the subnet layout
    #[error("Address space {cidr} cannot hold {required} /{prefix_length} subnets")]
    AddressSpaceTooSmall {
        cidr: String,
        required: usize,
        prefix_length: u8,
    },

    /// Address space is wider than a network may be
    #[error("Address space {cidr} is wider than /{min_prefix_length}")]
    AddressSpaceTooLarge { cidr: String, min_prefix_length: u8 },

    /// A rule admits every address where that is not permitted
    #[error("Security group {target} is open to any address on {ports}")]
    OpenIngress { target: String, ports: String },

    /// A rule admits a source that is not permitted for the target
    #[error("Security group {target} admits unpermitted source {source_peer}")]
    UnpermittedSource { target: String, source_peer: String },

    /// A resource sits in the wrong subnet tier
    #[error("{resource} must be placed in {required} subnets, found {subnet}")]
    PlacementViolation {
        resource: String,
        subnet: String,
        required: SubnetTier,
    },

    /// A resource has no subnets at all
    #[error("{0} is not placed in any subnet")]
    Unplaced(String),

    /// Health check bounds violated
    #[error("Invalid health check: {0}")]
    InvalidHealthCheck(String),

    /// Log retention period not accepted by the log service
    #[error("Invalid log retention: {0} days")]
    InvalidRetention(u32),

    /// Replicated cache layout is malformed
    #[error("Invalid cache replication: {0}")]
    InvalidReplication(String),
}

/// Where a resource was placed, recorded by the builder that declared it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Placed resource
    pub resource: LogicalId,
    /// Tier the resource must live in
    pub required: SubnetTier,
    /// Subnets it was placed in
    pub subnets: Vec<LogicalId>,
}

/// Validate every placement against the subnet tier table
///
/// # Rules
/// - A placement must name at least one subnet
/// - Every named subnet must belong to the required tier
pub fn validate_placements(
    placements: &[Placement],
    tiers: &BTreeMap<LogicalId, SubnetTier>,
) -> ValidationResult {
    for placement in placements {
        if placement.subnets.is_empty() {
            return Err(ValidationError::Unplaced(placement.resource.to_string()));
        }

        for subnet in &placement.subnets {
            if tiers.get(subnet) != Some(&placement.required) {
                return Err(ValidationError::PlacementViolation {
                    resource: placement.resource.to_string(),
                    subnet: subnet.to_string(),
                    required: placement.required,
                });
            }
        }
    }
    Ok(())
}

/// Validate that "any" appears only as the source of the public listener rule
///
/// # Rules
/// - A rule whose source is `0.0.0.0/0` must target the load balancer
///   identity and cover exactly the listener port
pub fn validate_open_ingress(
    rules: &[IngressRule],
    load_balancer: &LogicalId,
    listener_port: u16,
) -> ValidationResult {
    for rule in rules.iter().filter(|rule| rule.source.is_any()) {
        if &rule.target != load_balancer || rule.ports != PortRange::tcp(listener_port) {
            return Err(ValidationError::OpenIngress {
                target: rule.target.to_string(),
                ports: rule.ports.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate that a target identity is reachable only from permitted peers
pub fn validate_permitted_sources(
    rules: &[IngressRule],
    target: &LogicalId,
    permitted: &[Peer],
) -> ValidationResult {
    for rule in rules.iter().filter(|rule| &rule.target == target) {
        if !permitted.contains(&rule.source) {
            return Err(ValidationError::UnpermittedSource {
                target: target.to_string(),
                source_peer: rule.source.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate that physical names are unique and derived from the prefix
pub fn validate_physical_names<'a>(
    names: impl IntoIterator<Item = &'a str>,
    prefix: &NamePrefix,
) -> ValidationResult {
    let mut seen = BTreeSet::new();
    for name in names {
        if !prefix.owns(name) {
            return Err(ValidationError::UnqualifiedName {
                name: name.to_string(),
                prefix: prefix.to_string(),
            });
        }
        if !seen.insert(name) {
            return Err(ValidationError::DuplicatePhysicalName(name.to_string()));
        }
    }
    Ok(())
}

/// Validate health check timing
///
/// # Rules
/// - Interval 5-300 seconds
/// - Timeout 2-120 seconds
/// - Timeout strictly shorter than the interval
pub fn validate_health_check(interval_secs: u32, timeout_secs: u32) -> ValidationResult {
    if !(5..=300).contains(&interval_secs) {
        return Err(ValidationError::InvalidHealthCheck(format!(
            "interval {}s outside 5-300s",
            interval_secs
        )));
    }
    if !(2..=120).contains(&timeout_secs) {
        return Err(ValidationError::InvalidHealthCheck(format!(
            "timeout {}s outside 2-120s",
            timeout_secs
        )));
    }
    if timeout_secs >= interval_secs {
        return Err(ValidationError::InvalidHealthCheck(format!(
            "timeout {}s must be shorter than interval {}s",
            timeout_secs, interval_secs
        )));
    }
    Ok(())
}

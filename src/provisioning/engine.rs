// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning-engine boundary
//!
//! The engine that turns a declaration into a live resource is an external
//! collaborator. The synthesizer only ever talks to it through
//! [`ProvisioningEngine`], handing over declarations in dependency order.

use std::collections::BTreeSet;
use tracing::debug;

use super::{ResourceDeclaration, ResourceHandle};
use crate::domain::LogicalId;
use crate::errors::{Component, SynthError, SynthResult};

/// Receives declarations in topological order
pub trait ProvisioningEngine {
    /// Accept one declaration and return its handle
    fn declare(&mut self, declaration: &ResourceDeclaration) -> SynthResult<ResourceHandle>;
}

/// Engine that records what it is given
///
/// Rejects a declaration whose upstream resources it has not seen yet, so a
/// replay through it proves the order is topological.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    declared: Vec<ResourceDeclaration>,
    seen: BTreeSet<LogicalId>,
}

impl RecordingEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarations received so far
    pub fn declared(&self) -> &[ResourceDeclaration] {
        &self.declared
    }
}

impl ProvisioningEngine for RecordingEngine {
    fn declare(&mut self, declaration: &ResourceDeclaration) -> SynthResult<ResourceHandle> {
        for upstream in declaration.upstream_ids()? {
            if !self.seen.contains(&upstream) {
                return Err(SynthError::dependency(
                    Component::Provisioning,
                    format!("{} received before its upstream {}", declaration.id, upstream),
                ));
            }
        }

        debug!(id = %declaration.id, kind = %declaration.kind, "recorded declaration");
        self.seen.insert(declaration.id.clone());
        self.declared.push(declaration.clone());
        Ok(ResourceHandle::new(declaration.id.clone(), declaration.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceKind;
    use serde_json::json;

    #[test]
    fn test_rejects_out_of_order_replay() {
        let vpc = ResourceDeclaration::new(
            Component::Network,
            ResourceKind::Vpc,
            LogicalId::scoped("Network", "Vpc"),
            json!({}),
        );
        let subnet = ResourceDeclaration::new(
            Component::Network,
            ResourceKind::Subnet,
            LogicalId::scoped("Network", "Subnet"),
            json!({"VpcId": {"Ref": "NetworkVpc"}}),
        );

        let mut engine = RecordingEngine::new();
        assert!(engine.declare(&subnet).unwrap_err().is_dependency());

        engine.declare(&vpc).unwrap();
        let handle = engine.declare(&subnet).unwrap();
        assert_eq!(handle.kind(), ResourceKind::Subnet);
        assert_eq!(engine.declared().len(), 2);
    }
}

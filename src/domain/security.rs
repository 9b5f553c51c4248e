// Copyright (c) 2025 - Cowboy AI, Inc.
//! Security Allow-Graph Value Objects
//!
//! A security identity is a security group plus the inbound rules that name
//! who may reach it. Each rule is one edge of the stack's allow-graph.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Ipv4Cidr, LogicalId, PortRange};

/// Source endpoint of an inbound rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Peer {
    /// Another security identity in the stack
    SecurityGroup { id: LogicalId },
    /// An address block
    Cidr { block: Ipv4Cidr },
}

impl Peer {
    /// A peer matching every IPv4 address
    pub fn any_ipv4() -> Self {
        Self::Cidr {
            block: Ipv4Cidr::any_ipv4(),
        }
    }

    /// Whether this peer is "any"
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Cidr { block } if block.is_any())
    }

    /// Security group logical id, if the peer is one
    pub fn security_group(&self) -> Option<&LogicalId> {
        match self {
            Self::SecurityGroup { id } => Some(id),
            Self::Cidr { .. } => None,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecurityGroup { id } => write!(f, "sg:{}", id),
            Self::Cidr { block } => write!(f, "cidr:{}", block),
        }
    }
}

/// One inbound allow-rule (an edge of the allow-graph)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngressRule {
    /// Rule resource logical id
    pub id: LogicalId,
    /// Security group the rule opens
    pub target: LogicalId,
    /// Who may connect
    pub source: Peer,
    /// Which ports
    pub ports: PortRange,
    /// Human-readable purpose
    pub description: String,
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} on {} ({})",
            self.source, self.target, self.ports, self.description
        )
    }
}

/// Security group and its accumulated inbound rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIdentity {
    id: LogicalId,
    name: String,
    rules: Vec<IngressRule>,
}

impl SecurityIdentity {
    pub(crate) fn new(id: LogicalId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Security group logical id
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    /// Physical security group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inbound rules in declaration order
    pub fn rules(&self) -> &[IngressRule] {
        &self.rules
    }

    /// This identity as the source of another identity's rule
    pub fn as_peer(&self) -> Peer {
        Peer::SecurityGroup {
            id: self.id.clone(),
        }
    }

    /// Whether a source may reach a port on this identity
    pub fn allows(&self, source: &Peer, port: u16) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.ports.contains(port) && (&rule.source == source || rule.source.is_any()))
    }

    pub(crate) fn push_rule(&mut self, rule: IngressRule) {
        self.rules.push(rule);
    }
}

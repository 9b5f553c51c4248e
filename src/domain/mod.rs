// Copyright (c) 2025 - Cowboy AI, Inc.
//! Synthesis Domain Models
//!
//! Value objects with validation invariants shared by every builder.
//!
//! # Value Objects with Invariants
//!
//! - [`Ipv4Cidr`] - canonical IPv4 network blocks with subnet carving
//! - [`PortRange`] - TCP port ranges
//! - [`NamePrefix`] - stage prefix every physical name derives from
//! - [`LogicalId`] - stable in-template resource identity
//! - [`ResourceKind`] - declared resource taxonomy
//! - [`RemovalPolicy`] / [`RetentionDays`] - lifecycle policy
//!
//! # Allow-Graph
//!
//! - [`SecurityIdentity`] - a security group and its inbound rules
//! - [`IngressRule`] / [`Peer`] - one edge and its source endpoint
//!
//! # Invariants
//!
//! Pure validation functions live in [`invariants`].

pub mod invariants;
pub mod lifecycle;
pub mod logical_id;
pub mod naming;
pub mod network;
pub mod resource_kind;
pub mod security;

pub use invariants::{Placement, ValidationError, ValidationResult};
pub use lifecycle::{RemovalPolicy, RetentionDays};
pub use logical_id::LogicalId;
pub use naming::{NameError, NamePrefix};
pub use network::{Ipv4Cidr, NetworkError, PortRange, SubnetTier};
pub use resource_kind::{ResourceCategory, ResourceKind, TagSupport};
pub use security::{IngressRule, Peer, SecurityIdentity};

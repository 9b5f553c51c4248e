// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Builders
//!
//! One builder per tier. Each borrows the environment descriptor, declares
//! its resources into the shared [`StackGraph`](crate::provisioning::StackGraph)
//! and returns typed handles for the builders downstream of it:
//!
//! ```text
//! network ─► compute ─┬─► cache
//!                     ├─► database
//!                     ├─► search
//!                     └─► container service
//! ```

pub mod cache;
pub mod compute;
pub mod container;
pub mod database;
pub mod network;
pub mod search;
pub mod security;

pub use cache::{CacheCluster, CacheClusterBuilder, CacheTopology};
pub use compute::{ComputeCluster, ComputeClusterBuilder, ExecutionRole, LoadBalancer};
pub use container::{ContainerService, ContainerServiceBuilder};
pub use database::{Database, DatabaseProps, RelationalDatabaseBuilder};
pub use network::{NetworkTopology, NetworkTopologyBuilder, Subnet};
pub use search::{SearchDomain, SearchDomainBuilder};
pub use security::{FleetIdentity, IngressSource, PublicIdentity, ServiceIdentity};

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Boundary
//!
//! - [`ResourceDeclaration`] / [`ResourceHandle`] - what crosses the boundary
//! - [`StackGraph`] - the in-synthesis dependency graph
//! - [`StackTemplate`] - the emitted graph and outputs
//! - [`ProvisioningEngine`] - the external collaborator's interface

pub mod declaration;
pub mod engine;
pub mod graph;
pub mod template;

pub use crate::domain::LogicalId;
pub use declaration::{join, pseudo, references, ResourceDeclaration, ResourceHandle};
pub use engine::{ProvisioningEngine, RecordingEngine};
pub use graph::{PhysicalName, StackGraph};
pub use template::{StackOutput, StackTemplate, TEMPLATE_FORMAT_VERSION};

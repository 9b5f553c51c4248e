// Copyright (c) 2025 - Cowboy AI, Inc.
//! Environment-parameterized cloud topology synthesis
//!
//! Resolves a deployment stage into an environment descriptor, declares the
//! full application topology (network, compute fleet, cache, database,
//! search, container service) into a dependency graph, and emits a
//! CloudFormation-shaped template.
//!
//! # Modules
//!
//! - [`config`] - stage resolution into an [`EnvironmentDescriptor`]
//! - [`domain`] - value objects and pure graph invariants
//! - [`provisioning`] - declarations, the stack graph and the engine boundary
//! - [`constructs`] - one builder per tier
//! - [`stack`] - composition, tagging and validation
//! - [`publish`] - template delivery over NATS

pub mod config;
pub mod constructs;
pub mod domain;
pub mod errors;
pub mod provisioning;
pub mod publish;
pub mod stack;

// Re-export commonly used types
pub use config::{EnvironmentConfigResolver, EnvironmentDescriptor, ExternalInputs, Stage};
pub use errors::{Component, SynthError, SynthResult};
pub use provisioning::{ProvisioningEngine, RecordingEngine, StackTemplate};
pub use publish::{NatsClient, NatsConfig, SynthesisEnvelope, TemplateSink};
pub use stack::{ComposedStack, StackComposer};

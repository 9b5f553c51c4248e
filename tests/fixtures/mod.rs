// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-infrastructure-synth
//!
//! Provides deterministic environments, composed stacks and delivery
//! envelopes for integration tests.
//!
//! # Design Principles
//! - All test data is deterministic (no `Uuid::now_v7()` or `Utc::now()`)
//! - External inputs never come from the process environment
//! - Fixtures are the ONLY place that builds resolvers

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Mutex;
use uuid::Uuid;

use cim_infrastructure_synth::domain::{Ipv4Cidr, LogicalId};
use cim_infrastructure_synth::provisioning::{ResourceDeclaration, StackTemplate};
use cim_infrastructure_synth::{
    ComposedStack, EnvironmentConfigResolver, EnvironmentDescriptor, ExternalInputs, Stage,
    StackComposer, SynthResult, SynthesisEnvelope, TemplateSink,
};

/// Account used for featureDev environments
pub const FEATURE_ACCOUNT: &str = "222222222222";

/// Region used for featureDev environments
pub const FEATURE_REGION: &str = "eu-west-1";

// Fixed message id (UUID v7 format, but deterministic for testing)
pub const MESSAGE_ID_1: &str = "01934f4a-0001-7000-8000-000000000001";

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

/// Parse a fixed UUID from a constant string
pub fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("Invalid UUID in test fixture")
}

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// Inputs for a featureDev environment named by the given change id
pub fn feature_inputs(change_id: &str) -> ExternalInputs {
    ExternalInputs::default()
        .with_change_id(change_id)
        .with_target(FEATURE_ACCOUNT, FEATURE_REGION)
}

/// Resolve a stage with no external inputs
pub fn resolve(stage: Stage) -> EnvironmentDescriptor {
    EnvironmentConfigResolver::default()
        .resolve(stage)
        .expect("Stage should resolve without inputs")
}

/// Resolve a featureDev environment
pub fn resolve_feature(change_id: &str) -> EnvironmentDescriptor {
    EnvironmentConfigResolver::new(feature_inputs(change_id))
        .resolve(Stage::FeatureDev)
        .expect("featureDev should resolve with complete inputs")
}

/// The dev environment on `10.0.0.0/16`
pub fn dev_on_ten() -> EnvironmentDescriptor {
    resolve(Stage::Dev).with_network_cidr(Ipv4Cidr::new("10.0.0.0/16").expect("Invalid CIDR"))
}

/// Compose a stack for the given environment
pub fn compose(env: &EnvironmentDescriptor) -> ComposedStack {
    StackComposer::new(env)
        .compose()
        .expect("Stack should compose")
}

/// Look up a declared resource by logical id
pub fn resource<'t>(template: &'t StackTemplate, id: &str) -> &'t ResourceDeclaration {
    let id = LogicalId::new(id).expect("Invalid logical id in test");
    template
        .resource(&id)
        .unwrap_or_else(|| panic!("{} not declared", id))
}

/// Find the resource a `Ref` token points at
pub fn dereference<'t>(template: &'t StackTemplate, token: &Value) -> &'t ResourceDeclaration {
    let id = token["Ref"].as_str().expect("Token is not a Ref");
    resource(template, id)
}

/// Envelope with fixed id and timestamp
pub fn envelope_fixture(template: &StackTemplate) -> SynthesisEnvelope {
    SynthesisEnvelope {
        message_id: parse_uuid(MESSAGE_ID_1),
        stage: Stage::Dev,
        stage_name: "dev".to_string(),
        stack_name: template.name.clone(),
        synthesized_at: fixed_timestamp(),
        template: template.to_cloudformation(),
    }
}

/// Sink that keeps every delivered envelope in memory
#[derive(Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<(String, SynthesisEnvelope)>>,
}

impl MemorySink {
    pub fn delivered(&self) -> Vec<(String, SynthesisEnvelope)> {
        self.delivered.lock().expect("Sink lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl TemplateSink for MemorySink {
    async fn deliver(&self, envelope: &SynthesisEnvelope) -> SynthResult<()> {
        self.delivered
            .lock()
            .expect("Sink lock poisoned")
            .push((envelope.subject(), envelope.clone()));
        Ok(())
    }
}

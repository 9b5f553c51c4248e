// Copyright (c) 2025 - Cowboy AI, Inc.
//! Template delivery over NATS
//!
//! A synthesized template is wrapped in a [`SynthesisEnvelope`] and published
//! on a per-stage subject:
//!
//! ```text
//! infrastructure.stack.{stage}.synthesized
//! ```
//!
//! # Examples
//!
//! ```rust
//! use cim_infrastructure_synth::publish::{stack_subject, StackEvent};
//!
//! assert_eq!(
//!     stack_subject("pr-124", StackEvent::Synthesized),
//!     "infrastructure.stack.pr-124.synthesized"
//! );
//! ```

use async_nats::{Client, ConnectOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Stage;
use crate::errors::{SynthError, SynthResult};
use crate::provisioning::StackTemplate;

/// Root namespace for all infrastructure subjects
pub const INFRASTRUCTURE_ROOT: &str = "infrastructure";

/// Stack lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackEvent {
    /// A template was synthesized
    Synthesized,
}

impl fmt::Display for StackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackEvent::Synthesized => write!(f, "synthesized"),
        }
    }
}

/// `infrastructure.stack.{stage}.{event}`
pub fn stack_subject(stage_name: &str, event: StackEvent) -> String {
    format!("{}.stack.{}.{}", INFRASTRUCTURE_ROOT, stage_name, event)
}

/// Published wrapper around a synthesized template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisEnvelope {
    /// Time-ordered message id
    pub message_id: Uuid,
    pub stage: Stage,
    pub stage_name: String,
    pub stack_name: String,
    pub synthesized_at: DateTime<Utc>,
    /// CloudFormation document
    pub template: serde_json::Value,
}

impl SynthesisEnvelope {
    /// Wrap a template
    pub fn new(stage: Stage, stage_name: impl Into<String>, template: &StackTemplate) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            stage,
            stage_name: stage_name.into(),
            stack_name: template.name.clone(),
            synthesized_at: Utc::now(),
            template: template.to_cloudformation(),
        }
    }

    /// Subject this envelope is published on
    pub fn subject(&self) -> String {
        stack_subject(&self.stage_name, StackEvent::Synthesized)
    }
}

/// Destination for finished templates
#[async_trait::async_trait]
pub trait TemplateSink: Send + Sync {
    /// Deliver one envelope
    async fn deliver(&self, envelope: &SynthesisEnvelope) -> SynthResult<()>;
}

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "cim-infrastructure-synth".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl NatsConfig {
    /// Load configuration from environment variables
    ///
    /// Returns `None` when `NATS_URL` is not set. `NATS_URL` may hold several
    /// comma-separated servers.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("NATS_URL").ok().filter(|u| !u.trim().is_empty())?;
        let defaults = Self::default();
        Some(Self {
            servers: url.split(',').map(|s| s.trim().to_string()).collect(),
            name: std::env::var("NATS_CLIENT_NAME").unwrap_or(defaults.name),
            connect_timeout: defaults.connect_timeout,
        })
    }
}

/// NATS client publishing synthesized templates
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect with the given configuration
    pub async fn connect(config: NatsConfig) -> SynthResult<Self> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout);

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| SynthError::Delivery(e.to_string()))?;

        info!("Connected to NATS at {:?}", config.servers);

        Ok(Self { client })
    }

    /// Publish a message to a subject
    pub async fn publish<T>(&self, subject: &str, message: &T) -> SynthResult<()>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| SynthError::Delivery(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| SynthError::Delivery(e.to_string()))?;

        debug!("Published message to subject: {}", subject);
        Ok(())
    }
}

#[async_trait::async_trait]
impl TemplateSink for NatsClient {
    async fn deliver(&self, envelope: &SynthesisEnvelope) -> SynthResult<()> {
        self.publish(&envelope.subject(), envelope).await
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Synthesizer
//!
//! Resolves a stage, composes the product setup stack and prints the
//! CloudFormation template to stdout.
//!
//! Run with: cargo run --bin synth -- <stage>
//!
//! Environment:
//! 1. `STAGE` when no stage argument is given
//! 2. `PR_NUMBER`, `ACCOUNT`/`CDK_DEFAULT_ACCOUNT`, `REGION`/`CDK_DEFAULT_REGION`
//!    for featureDev environments
//! 3. `NETWORK_CIDR`, `DB_REMOVAL_POLICY` overrides
//! 4. `NATS_URL` to also publish the template

use anyhow::{Context, Result};
use cim_infrastructure_synth::{
    EnvironmentConfigResolver, NatsClient, NatsConfig, StackComposer, SynthesisEnvelope,
    TemplateSink,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the template
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let stage_key = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("STAGE").ok())
        .context("Usage: synth <featureDev|dev|staging|prod> (or set STAGE)")?;

    let resolver = EnvironmentConfigResolver::from_env();
    let env = resolver
        .resolve_key(&stage_key)
        .with_context(|| format!("Failed to resolve stage {:?}", stage_key))?;

    let stack = StackComposer::new(&env)
        .compose()
        .with_context(|| format!("Failed to compose stack for {}", env.stage_name))?;
    let template = stack.template();

    println!(
        "{}",
        template
            .to_json_pretty()
            .context("Failed to render template")?
    );

    if let Some(config) = NatsConfig::from_env() {
        let client = NatsClient::connect(config)
            .await
            .context("Failed to connect to NATS")?;
        let envelope = SynthesisEnvelope::new(env.stage, env.stage_name.clone(), template);
        client
            .deliver(&envelope)
            .await
            .context("Failed to publish template")?;
        info!(
            subject = %envelope.subject(),
            message_id = %envelope.message_id,
            "published template"
        );
    }

    Ok(())
}

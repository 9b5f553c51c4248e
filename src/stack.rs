// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Composition
//!
//! [`StackComposer`] runs every builder in dependency order against one
//! environment descriptor, applies the stage tag, validates the finished
//! graph and hands back a [`ComposedStack`]. Composition is total: the first
//! error aborts and no partial graph ever reaches a provisioning engine.
//!
//! # Example
//!
//! ```rust
//! use cim_infrastructure_synth::config::{EnvironmentConfigResolver, Stage};
//! use cim_infrastructure_synth::stack::StackComposer;
//!
//! let env = EnvironmentConfigResolver::default().resolve(Stage::Dev).unwrap();
//! let stack = StackComposer::new(&env).compose().unwrap();
//! assert!(stack.template().output("MysqlEndpoint").is_some());
//! ```

use serde::Serialize;
use tracing::info;

use crate::config::EnvironmentDescriptor;
use crate::constructs::{
    CacheClusterBuilder, ComputeClusterBuilder, ContainerServiceBuilder, DatabaseProps,
    IngressSource, NetworkTopologyBuilder, RelationalDatabaseBuilder, SearchDomainBuilder,
};
use crate::domain::invariants::{
    validate_open_ingress, validate_permitted_sources, validate_physical_names,
    validate_placements,
};
use crate::domain::{IngressRule, Placement, ValidationResult};
use crate::errors::{Component, SynthError, SynthResult};
use crate::provisioning::{ProvisioningEngine, ResourceHandle, StackGraph, StackTemplate};

/// Tag key stamped on every taggable resource
pub const STAGE_TAG: &str = "stage";

/// Finished, validated stack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedStack {
    template: StackTemplate,
    allow_graph: Vec<IngressRule>,
    placements: Vec<Placement>,
    physical_names: Vec<String>,
}

impl ComposedStack {
    /// Emitted template
    pub fn template(&self) -> &StackTemplate {
        &self.template
    }

    /// Every inbound rule in the stack
    pub fn allow_graph(&self) -> &[IngressRule] {
        &self.allow_graph
    }

    /// Where each placed resource landed
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Stage-qualified physical names
    pub fn physical_names(&self) -> &[String] {
        &self.physical_names
    }

    pub fn into_template(self) -> StackTemplate {
        self.template
    }

    /// Replay the declarations in dependency order
    pub fn apply(&self, engine: &mut dyn ProvisioningEngine) -> SynthResult<Vec<ResourceHandle>> {
        let handles = self
            .template
            .resources
            .iter()
            .map(|declaration| engine.declare(declaration))
            .collect::<SynthResult<Vec<_>>>()?;

        info!(
            component = %Component::Composer,
            stack = %self.template.name,
            resources = handles.len(),
            "handed stack to provisioning engine"
        );
        Ok(handles)
    }
}

/// Composes the full topology for one environment
pub struct StackComposer<'a> {
    env: &'a EnvironmentDescriptor,
    database: Option<DatabaseProps>,
}

impl<'a> StackComposer<'a> {
    pub fn new(env: &'a EnvironmentDescriptor) -> Self {
        Self { env, database: None }
    }

    /// Use explicit database props instead of the descriptor's
    pub fn with_database_props(mut self, props: DatabaseProps) -> Self {
        self.database = Some(props);
        self
    }

    /// Build, tag and validate the stack
    pub fn compose(&self) -> SynthResult<ComposedStack> {
        let env = self.env;
        let mut graph = StackGraph::new();

        let network = NetworkTopologyBuilder::new(env).build(&mut graph)?;
        let compute = ComputeClusterBuilder::new(env).build(&mut graph, &network)?;
        let fleet = &compute.fleet_identity;

        let cache = CacheClusterBuilder::new(env).build(&mut graph, &network, fleet)?;

        let mut database_builder = RelationalDatabaseBuilder::new(env);
        if let Some(props) = &self.database {
            database_builder = database_builder.with_props(props.clone());
        }
        let database = database_builder.build(&mut graph, &network, fleet)?;

        let search = SearchDomainBuilder::new(env).build(
            &mut graph,
            &network,
            fleet,
            &compute.execution_role,
        )?;
        ContainerServiceBuilder::new(env).build(&mut graph, &network, &compute)?;

        let tagged = graph.apply_tag(STAGE_TAG, &env.stage_name);

        let rules = graph.ingress_rules();
        let fleet_only = [fleet.peer()];
        let mut database_sources = vec![fleet.peer()];
        database_sources.extend(database_builder.props().extra_sources.iter().cloned());

        let checks: [ValidationResult; 7] = [
            validate_placements(graph.placements(), graph.subnet_tiers()),
            validate_open_ingress(
                rules,
                compute.load_balancer.identity.id(),
                env.container.listener_port,
            ),
            validate_permitted_sources(
                rules,
                fleet.id(),
                &[compute.load_balancer.identity.peer()],
            ),
            validate_permitted_sources(rules, cache.identity.id(), &fleet_only),
            validate_permitted_sources(rules, search.identity.id(), &fleet_only),
            validate_permitted_sources(rules, database.identity.id(), &database_sources),
            validate_physical_names(graph.physical_names().iter().map(|n| n.name.as_str()), &env.prefix),
        ];
        for check in checks {
            check.map_err(|e| SynthError::validation(Component::Composer, e))?;
        }

        let template = graph.to_template(
            env.stack_name(),
            format!(
                "Product setup for stage {} in {}/{}",
                env.stage_name, env.target.account, env.target.region
            ),
        );

        info!(
            component = %Component::Composer,
            stage = %env.stage_name,
            stack = %template.name,
            resources = template.resources.len(),
            outputs = template.outputs.len(),
            tagged,
            "composed stack"
        );

        Ok(ComposedStack {
            template,
            allow_graph: graph.ingress_rules().to_vec(),
            placements: graph.placements().to_vec(),
            physical_names: graph
                .physical_names()
                .iter()
                .map(|n| n.name.clone())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvironmentConfigResolver, Stage};
    use crate::domain::{Ipv4Cidr, ResourceKind, TagSupport};
    use crate::provisioning::RecordingEngine;

    fn dev() -> EnvironmentDescriptor {
        EnvironmentConfigResolver::default().resolve(Stage::Dev).unwrap()
    }

    #[test]
    fn test_every_taggable_resource_tagged() {
        let env = dev();
        let stack = StackComposer::new(&env).compose().unwrap();
        for resource in &stack.template().resources {
            let has_stage = resource.properties["Tags"]
                .as_array()
                .map(|tags| tags.iter().any(|t| t["Key"] == STAGE_TAG && t["Value"] == "dev"))
                .unwrap_or(false);
            assert_eq!(
                has_stage,
                resource.kind.tag_support() != TagSupport::None,
                "{} tagging",
                resource.id
            );
        }
    }

    #[test]
    fn test_apply_replays_in_order() {
        let env = dev();
        let stack = StackComposer::new(&env).compose().unwrap();
        let mut engine = RecordingEngine::new();
        let handles = stack.apply(&mut engine).unwrap();
        assert_eq!(handles.len(), stack.template().resources.len());
        assert_eq!(engine.declared(), stack.template().resources.as_slice());
    }

    #[test]
    fn test_outputs_present() {
        let env = dev();
        let stack = StackComposer::new(&env).compose().unwrap();
        for key in [
            "LoadBalancerDns",
            "FleetRoleArn",
            "MysqlEndpoint",
            "MysqlCredentials",
            "MysqlUserName",
            "MysqlDbName",
            "RedisEndpointAddress",
            "RedisEndpointPort",
            "SearchDomainEndpoint",
        ] {
            let output = stack.template().output(key).unwrap();
            assert!(output.export_name.as_deref().unwrap().starts_with("dev-"));
        }
    }

    #[test]
    fn test_database_extra_source_permitted() {
        let env = dev();
        let office = Ipv4Cidr::new("192.168.0.0/24").unwrap();
        let props = DatabaseProps::from_descriptor(&env).with_extra_source(&office);
        let stack = StackComposer::new(&env)
            .with_database_props(props)
            .compose()
            .unwrap();
        assert!(stack.allow_graph().iter().any(|r| r.source == office.peer()));
        assert_eq!(stack.template().resources_of(ResourceKind::DbInstance).count(), 1);
    }
}

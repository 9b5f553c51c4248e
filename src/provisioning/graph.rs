// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-synthesis resource graph
//!
//! [`StackGraph`] accepts declarations in order and rejects any that consume
//! a resource not yet declared, so the finished graph is acyclic by
//! construction. Alongside the resources it records the allow-graph, subnet
//! placements and physical names the composer validates at the end.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::declaration::{parse_id, tokens, Token};
use super::{ResourceDeclaration, ResourceHandle, StackOutput, StackTemplate};
use crate::domain::{
    IngressRule, LogicalId, Placement, ResourceKind, SubnetTier, TagSupport, ValidationError,
};
use crate::errors::{Component, SynthError, SynthResult};

/// Physical name recorded for a declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalName {
    pub resource: LogicalId,
    pub name: String,
}

/// Directed acyclic graph of declared resources
#[derive(Debug, Default)]
pub struct StackGraph {
    resources: Vec<ResourceDeclaration>,
    kinds: BTreeMap<LogicalId, ResourceKind>,
    outputs: Vec<StackOutput>,
    names: Vec<PhysicalName>,
    ingress: Vec<IngressRule>,
    placements: Vec<Placement>,
    subnet_tiers: BTreeMap<LogicalId, SubnetTier>,
}

impl StackGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource
    ///
    /// # Errors
    /// - `Validation` when the logical id is already declared
    /// - `Dependency` when a token or explicit dependency names an undeclared
    ///   resource, or reads an attribute its kind does not export
    pub fn declare(&mut self, declaration: ResourceDeclaration) -> SynthResult<ResourceHandle> {
        let component = declaration.component;

        if self.kinds.contains_key(&declaration.id) {
            return Err(SynthError::validation(
                component,
                ValidationError::DuplicateLogicalId(declaration.id.to_string()),
            ));
        }

        self.check_tokens(component, &declaration.id, &declaration.properties)?;
        for upstream in &declaration.depends_on {
            if !self.kinds.contains_key(upstream) {
                return Err(SynthError::dependency(
                    component,
                    format!("{} depends on undeclared {}", declaration.id, upstream),
                ));
            }
        }

        debug!(
            component = %component,
            id = %declaration.id,
            kind = %declaration.kind,
            "declared resource"
        );

        let handle = ResourceHandle::new(declaration.id.clone(), declaration.kind);
        self.kinds.insert(declaration.id.clone(), declaration.kind);
        self.resources.push(declaration);
        Ok(handle)
    }

    /// Declare a resource that carries a stage-qualified physical name
    pub fn declare_named(
        &mut self,
        declaration: ResourceDeclaration,
        name: impl Into<String>,
    ) -> SynthResult<ResourceHandle> {
        let handle = self.declare(declaration)?;
        self.names.push(PhysicalName {
            resource: handle.id().clone(),
            name: name.into(),
        });
        Ok(handle)
    }

    /// Add a stack output
    pub fn add_output(&mut self, component: Component, output: StackOutput) -> SynthResult<()> {
        let owner = LogicalId::scoped("Output", &output.key);
        self.check_tokens(component, &owner, &output.value)?;
        if self.outputs.iter().any(|o| o.key == output.key) {
            return Err(SynthError::validation(
                component,
                ValidationError::DuplicateLogicalId(output.key),
            ));
        }
        if let Some(export) = &output.export_name {
            self.names.push(PhysicalName {
                resource: owner,
                name: export.clone(),
            });
        }
        self.outputs.push(output);
        Ok(())
    }

    /// Record an edge of the allow-graph
    pub(crate) fn record_ingress(&mut self, rule: IngressRule) {
        self.ingress.push(rule);
    }

    /// Record where a resource was placed
    pub(crate) fn record_placement(&mut self, placement: Placement) {
        self.placements.push(placement);
    }

    /// Record the tier of a declared subnet
    pub(crate) fn record_subnet(&mut self, subnet: &ResourceHandle, tier: SubnetTier) {
        self.subnet_tiers.insert(subnet.id().clone(), tier);
    }

    /// Apply a tag to every resource that accepts tags
    ///
    /// An existing tag with the same key is overwritten.
    pub fn apply_tag(&mut self, key: &str, value: &str) -> usize {
        let mut tagged = 0;
        for declaration in &mut self.resources {
            let tag = match declaration.kind.tag_support() {
                TagSupport::None => continue,
                TagSupport::KeyValueList => json!({ "Key": key, "Value": value }),
                TagSupport::PropagateAtLaunch => {
                    json!({ "Key": key, "Value": value, "PropagateAtLaunch": "true" })
                }
            };

            let Some(properties) = declaration.properties.as_object_mut() else {
                continue;
            };
            let tags = properties
                .entry("Tags")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = tags {
                list.retain(|existing| existing.get("Key").and_then(Value::as_str) != Some(key));
                list.push(tag);
                tagged += 1;
            }
        }
        tagged
    }

    /// Declared resources in declaration order
    pub fn resources(&self) -> &[ResourceDeclaration] {
        &self.resources
    }

    /// Kind of a declared resource
    pub fn kind_of(&self, id: &LogicalId) -> Option<ResourceKind> {
        self.kinds.get(id).copied()
    }

    /// Number of declared resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether nothing has been declared
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Outputs in declaration order
    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    /// Recorded physical names
    pub fn physical_names(&self) -> &[PhysicalName] {
        &self.names
    }

    /// Recorded allow-graph edges
    pub fn ingress_rules(&self) -> &[IngressRule] {
        &self.ingress
    }

    /// Recorded placements
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Tier table for declared subnets
    pub fn subnet_tiers(&self) -> &BTreeMap<LogicalId, SubnetTier> {
        &self.subnet_tiers
    }

    /// Freeze the graph into a template
    pub fn to_template(&self, name: impl Into<String>, description: impl Into<String>) -> StackTemplate {
        StackTemplate {
            name: name.into(),
            description: description.into(),
            resources: self.resources.clone(),
            outputs: self.outputs.clone(),
        }
    }

    fn check_tokens(&self, component: Component, owner: &LogicalId, value: &Value) -> SynthResult<()> {
        for token in tokens(value) {
            let target = parse_id(component, token.target())?;
            let kind = self.kinds.get(&target).ok_or_else(|| {
                SynthError::dependency(
                    component,
                    format!("{} references undeclared {}", owner, target),
                )
            })?;
            if let Token::GetAtt(_, attribute) = token {
                if !kind.exports(attribute) {
                    return Err(SynthError::dependency(
                        component,
                        format!("{} reads {}.{} which {} does not export", owner, target, attribute, kind),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(kind: ResourceKind, name: &str, properties: Value) -> ResourceDeclaration {
        ResourceDeclaration::new(
            Component::Network,
            kind,
            LogicalId::scoped("Network", name),
            properties,
        )
    }

    #[test]
    fn test_declare_in_order() {
        let mut graph = StackGraph::new();
        let vpc = graph
            .declare(declaration(ResourceKind::Vpc, "Vpc", json!({"CidrBlock": "10.0.0.0/16"})))
            .unwrap();
        let subnet = graph
            .declare(declaration(
                ResourceKind::Subnet,
                "Subnet",
                json!({"VpcId": vpc.reference()}),
            ))
            .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.kind_of(subnet.id()), Some(ResourceKind::Subnet));
    }

    #[test]
    fn test_reject_undeclared_reference() {
        let mut graph = StackGraph::new();
        let err = graph
            .declare(declaration(
                ResourceKind::Subnet,
                "Subnet",
                json!({"VpcId": {"Ref": "NetworkVpc"}}),
            ))
            .unwrap_err();
        assert!(err.is_dependency());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_reject_unexported_attribute() {
        let mut graph = StackGraph::new();
        graph
            .declare(declaration(ResourceKind::Vpc, "Vpc", json!({})))
            .unwrap();
        let err = graph
            .declare(declaration(
                ResourceKind::Subnet,
                "Subnet",
                json!({"Address": {"Fn::GetAtt": ["NetworkVpc", "Endpoint.Address"]}}),
            ))
            .unwrap_err();
        assert!(err.is_dependency());
    }

    #[test]
    fn test_reject_duplicate_id() {
        let mut graph = StackGraph::new();
        graph
            .declare(declaration(ResourceKind::Vpc, "Vpc", json!({})))
            .unwrap();
        let err = graph
            .declare(declaration(ResourceKind::Vpc, "Vpc", json!({})))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_apply_tag() {
        let mut graph = StackGraph::new();
        graph
            .declare(declaration(
                ResourceKind::Vpc,
                "Vpc",
                json!({"Tags": [{"Key": "stage", "Value": "old"}, {"Key": "Name", "Value": "dev-vpc"}]}),
            ))
            .unwrap();
        graph
            .declare(declaration(ResourceKind::AutoScalingGroup, "Fleet", json!({})))
            .unwrap();
        graph
            .declare(declaration(ResourceKind::Route, "Route", json!({})))
            .unwrap();

        assert_eq!(graph.apply_tag("stage", "dev"), 2);

        let vpc_tags = graph.resources()[0].properties["Tags"].as_array().unwrap();
        assert_eq!(vpc_tags.len(), 2);
        assert!(vpc_tags.contains(&json!({"Key": "stage", "Value": "dev"})));

        let fleet_tags = &graph.resources()[1].properties["Tags"];
        assert_eq!(fleet_tags[0]["PropagateAtLaunch"], "true");
        assert!(graph.resources()[2].properties.get("Tags").is_none());
    }

    #[test]
    fn test_outputs_checked_and_named() {
        let mut graph = StackGraph::new();
        let err = graph
            .add_output(
                Component::Network,
                StackOutput::new("VpcId", json!({"Ref": "NetworkVpc"})),
            )
            .unwrap_err();
        assert!(err.is_dependency());

        let vpc = graph
            .declare(declaration(ResourceKind::Vpc, "Vpc", json!({})))
            .unwrap();
        graph
            .add_output(
                Component::Network,
                StackOutput::new("VpcId", vpc.reference()).exported_as("dev-VpcId"),
            )
            .unwrap();
        assert_eq!(graph.physical_names()[0].name, "dev-VpcId");
        assert!(graph
            .add_output(Component::Network, StackOutput::new("VpcId", vpc.reference()))
            .unwrap_err()
            .is_validation());
    }
}

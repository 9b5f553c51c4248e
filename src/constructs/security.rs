// Copyright (c) 2025 - Cowboy AI, Inc.
//! Capability-scoped security identities
//!
//! Builders do not pass raw security groups around. The fleet identity, the
//! load balancer identity and each stateful service's identity are distinct
//! types, so a rule can only be opened from a source the caller actually
//! holds.

use serde_json::json;
use tracing::debug;

use crate::domain::{
    IngressRule, Ipv4Cidr, LogicalId, Peer, PortRange, ResourceKind, SecurityIdentity,
};
use crate::errors::{Component, SynthResult};
use crate::provisioning::{ResourceDeclaration, ResourceHandle, StackGraph};

/// Anything that can appear as the source of an inbound rule
pub trait IngressSource {
    /// The peer this source resolves to
    fn peer(&self) -> Peer;
}

impl IngressSource for Peer {
    fn peer(&self) -> Peer {
        self.clone()
    }
}

impl IngressSource for Ipv4Cidr {
    fn peer(&self) -> Peer {
        Peer::Cidr { block: *self }
    }
}

/// Security group of the compute fleet
///
/// The only identity permitted to reach the cache, database and search
/// services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetIdentity(SecurityIdentity);

/// Security group of the public load balancer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIdentity(SecurityIdentity);

/// Security group owned by one backing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity(SecurityIdentity);

macro_rules! identity_accessors {
    ($($ty:ident),+) => {
        $(
            impl $ty {
                /// Underlying identity and its rules
                pub fn identity(&self) -> &SecurityIdentity {
                    &self.0
                }

                /// Security group logical id
                pub fn id(&self) -> &LogicalId {
                    self.0.id()
                }

                /// `GroupId` attribute token
                pub fn group_id(&self) -> serde_json::Value {
                    json!({ "Fn::GetAtt": [self.0.id().as_str(), "GroupId"] })
                }
            }

            impl IngressSource for $ty {
                fn peer(&self) -> Peer {
                    self.0.as_peer()
                }
            }
        )+
    };
}

identity_accessors!(FleetIdentity, PublicIdentity, ServiceIdentity);

impl FleetIdentity {
    pub(crate) fn new(identity: SecurityIdentity) -> Self {
        Self(identity)
    }

    pub(crate) fn allow_from(
        &mut self,
        graph: &mut StackGraph,
        component: Component,
        source: &dyn IngressSource,
        ports: PortRange,
        description: &str,
    ) -> SynthResult<()> {
        allow_from(graph, component, &mut self.0, source, ports, description)
    }
}

impl PublicIdentity {
    pub(crate) fn new(identity: SecurityIdentity) -> Self {
        Self(identity)
    }

    pub(crate) fn allow_from(
        &mut self,
        graph: &mut StackGraph,
        component: Component,
        source: &dyn IngressSource,
        ports: PortRange,
        description: &str,
    ) -> SynthResult<()> {
        allow_from(graph, component, &mut self.0, source, ports, description)
    }
}

impl ServiceIdentity {
    pub(crate) fn new(identity: SecurityIdentity) -> Self {
        Self(identity)
    }

    /// Open one port range to a source
    pub fn allow_from(
        &mut self,
        graph: &mut StackGraph,
        component: Component,
        source: &dyn IngressSource,
        ports: PortRange,
        description: &str,
    ) -> SynthResult<()> {
        allow_from(graph, component, &mut self.0, source, ports, description)
    }
}

/// Declare a security group with unrestricted egress and no inbound rules
pub(crate) fn declare_security_group(
    graph: &mut StackGraph,
    component: Component,
    id: LogicalId,
    group_name: &str,
    description: &str,
    vpc: &ResourceHandle,
) -> SynthResult<SecurityIdentity> {
    let declaration = ResourceDeclaration::new(
        component,
        ResourceKind::SecurityGroup,
        id,
        json!({
            "GroupName": group_name,
            "GroupDescription": description,
            "VpcId": vpc.reference(),
            "SecurityGroupEgress": [{
                "CidrIp": Ipv4Cidr::any_ipv4().to_string(),
                "IpProtocol": "-1",
                "Description": "Allow all outbound traffic by default",
            }],
        }),
    );
    let handle = graph.declare_named(declaration, group_name)?;
    Ok(SecurityIdentity::new(handle.id().clone(), group_name))
}

fn allow_from(
    graph: &mut StackGraph,
    component: Component,
    target: &mut SecurityIdentity,
    source: &dyn IngressSource,
    ports: PortRange,
    description: &str,
) -> SynthResult<()> {
    let peer = source.peer();
    let rule_id = LogicalId::scoped(
        target.id().as_str(),
        &format!("Ingress{}", target.rules().len() + 1),
    );

    let mut properties = json!({
        "GroupId": { "Fn::GetAtt": [target.id().as_str(), "GroupId"] },
        "IpProtocol": "tcp",
        "FromPort": ports.from_port(),
        "ToPort": ports.to_port(),
        "Description": description,
    });
    match &peer {
        Peer::SecurityGroup { id } => {
            properties["SourceSecurityGroupId"] = json!({ "Fn::GetAtt": [id.as_str(), "GroupId"] });
        }
        Peer::Cidr { block } => {
            properties["CidrIp"] = json!(block.to_string());
        }
    }

    graph.declare(ResourceDeclaration::new(
        component,
        ResourceKind::SecurityGroupIngress,
        rule_id.clone(),
        properties,
    ))?;

    let rule = IngressRule {
        id: rule_id,
        target: target.id().clone(),
        source: peer,
        ports,
        description: description.to_string(),
    };
    debug!(component = %component, rule = %rule, "opened ingress");
    graph.record_ingress(rule.clone());
    target.push_rule(rule);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vpc(graph: &mut StackGraph) -> ResourceHandle {
        graph
            .declare(ResourceDeclaration::new(
                Component::Network,
                ResourceKind::Vpc,
                LogicalId::scoped("Network", "Vpc"),
                json!({}),
            ))
            .unwrap()
    }

    #[test]
    fn test_allow_from_declares_rule() {
        let mut graph = StackGraph::new();
        let vpc = vpc(&mut graph);

        let fleet = FleetIdentity::new(
            declare_security_group(
                &mut graph,
                Component::Compute,
                LogicalId::scoped("Compute", "FleetSecurityGroup"),
                "dev-sg-fleet",
                "fleet",
                &vpc,
            )
            .unwrap(),
        );
        let mut cache = ServiceIdentity::new(
            declare_security_group(
                &mut graph,
                Component::Cache,
                LogicalId::scoped("Cache", "SecurityGroup"),
                "dev-sg-redis",
                "cache",
                &vpc,
            )
            .unwrap(),
        );

        cache
            .allow_from(&mut graph, Component::Cache, &fleet, PortRange::tcp(6379), "allow from fleet")
            .unwrap();

        assert!(cache.identity().allows(&fleet.peer(), 6379));
        assert_eq!(graph.ingress_rules().len(), 1);

        let rule = graph.resources().last().unwrap();
        assert_eq!(rule.kind, ResourceKind::SecurityGroupIngress);
        assert_eq!(rule.id.as_str(), "CacheSecurityGroupIngress1");
        assert_eq!(
            rule.properties["SourceSecurityGroupId"],
            json!({"Fn::GetAtt": ["ComputeFleetSecurityGroup", "GroupId"]})
        );
        assert_eq!(graph.physical_names().len(), 2);
    }

    #[test]
    fn test_cidr_source() {
        let mut graph = StackGraph::new();
        let vpc = vpc(&mut graph);
        let mut lb = PublicIdentity::new(
            declare_security_group(
                &mut graph,
                Component::Compute,
                LogicalId::scoped("Compute", "LoadBalancerSecurityGroup"),
                "dev-sg-lb",
                "lb",
                &vpc,
            )
            .unwrap(),
        );

        lb.allow_from(
            &mut graph,
            Component::Compute,
            &Ipv4Cidr::any_ipv4(),
            PortRange::tcp(80),
            "public listener",
        )
        .unwrap();

        let rule = graph.resources().last().unwrap();
        assert_eq!(rule.properties["CidrIp"], "0.0.0.0/0");
        assert!(graph.ingress_rules()[0].source.is_any());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network topology builder
//!
//! Declares the VPC, one public and one private `/24` subnet per
//! availability zone, the internet gateway, a single NAT gateway shared by
//! every private route table, and a VPC flow log delivered to a log group.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::config::EnvironmentDescriptor;
use crate::domain::{Ipv4Cidr, LogicalId, RemovalPolicy, ResourceKind, SubnetTier, ValidationError};
use crate::errors::{Component, SynthError, SynthResult};
use crate::provisioning::{references, ResourceDeclaration, ResourceHandle, StackGraph};

const SCOPE: &str = "Network";
const COMPONENT: Component = Component::Network;

/// Prefix length of every subnet
pub const SUBNET_PREFIX_LENGTH: u8 = 24;

/// Shortest network prefix the provider accepts for a VPC
pub const MIN_NETWORK_PREFIX_LENGTH: u8 = 16;

/// Largest network prefix that still fits the subnet layout
pub const MAX_NETWORK_PREFIX_LENGTH: u8 = 22;

/// Minimum availability zones
pub const MIN_AVAILABILITY_ZONES: usize = 2;

/// A declared subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subnet {
    pub handle: ResourceHandle,
    pub cidr: Ipv4Cidr,
    pub availability_zone: String,
    pub tier: SubnetTier,
}

/// Output of the network builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkTopology {
    vpc: ResourceHandle,
    cidr: Ipv4Cidr,
    public_subnets: Vec<Subnet>,
    private_subnets: Vec<Subnet>,
    flow_log_sink: ResourceHandle,
}

impl NetworkTopology {
    /// Assemble a topology from already-declared parts
    pub fn from_parts(
        vpc: ResourceHandle,
        cidr: Ipv4Cidr,
        public_subnets: Vec<Subnet>,
        private_subnets: Vec<Subnet>,
        flow_log_sink: ResourceHandle,
    ) -> Self {
        Self {
            vpc,
            cidr,
            public_subnets,
            private_subnets,
            flow_log_sink,
        }
    }

    pub fn vpc(&self) -> &ResourceHandle {
        &self.vpc
    }

    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    /// Flow log destination log group
    pub fn flow_log_sink(&self) -> &ResourceHandle {
        &self.flow_log_sink
    }

    /// Public subnets in allocation order
    pub fn public_subnets(&self) -> Result<&[Subnet], ValidationError> {
        if self.public_subnets.is_empty() {
            return Err(ValidationError::NoPublicSubnets);
        }
        Ok(&self.public_subnets)
    }

    /// Private subnets in allocation order
    pub fn private_subnets(&self) -> Result<&[Subnet], ValidationError> {
        if self.private_subnets.is_empty() {
            return Err(ValidationError::NoPrivateSubnets);
        }
        Ok(&self.private_subnets)
    }

    /// Every subnet, public first
    pub fn subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.public_subnets.iter().chain(self.private_subnets.iter())
    }
}

/// `[{"Ref": subnet}, ...]`
pub fn subnet_refs(subnets: &[Subnet]) -> Value {
    references(subnets.iter().map(|s| &s.handle))
}

/// Logical ids of the given subnets
pub fn subnet_ids(subnets: &[Subnet]) -> Vec<LogicalId> {
    subnets.iter().map(|s| s.handle.id().clone()).collect()
}

/// Builds the network topology for one environment
pub struct NetworkTopologyBuilder<'a> {
    env: &'a EnvironmentDescriptor,
}

impl<'a> NetworkTopologyBuilder<'a> {
    pub fn new(env: &'a EnvironmentDescriptor) -> Self {
        Self { env }
    }

    /// Declare the network
    ///
    /// # Errors
    /// - `Validation` when the address space is smaller than `/22` or fewer
    ///   than two availability zones are configured
    pub fn build(&self, graph: &mut StackGraph) -> SynthResult<NetworkTopology> {
        let env = self.env;
        let cidr = env.network_cidr;
        let zones = &env.availability_zones;

        if zones.len() < MIN_AVAILABILITY_ZONES {
            return Err(SynthError::validation(
                COMPONENT,
                ValidationError::InsufficientAvailabilityZones {
                    required: MIN_AVAILABILITY_ZONES,
                    actual: zones.len(),
                },
            ));
        }

        if cidr.prefix_length() < MIN_NETWORK_PREFIX_LENGTH {
            return Err(SynthError::validation(
                COMPONENT,
                ValidationError::AddressSpaceTooLarge {
                    cidr: cidr.to_string(),
                    min_prefix_length: MIN_NETWORK_PREFIX_LENGTH,
                },
            ));
        }

        let required = zones.len() * 2;
        if cidr.subnet_capacity(SUBNET_PREFIX_LENGTH) < required as u64
            || cidr.prefix_length() > MAX_NETWORK_PREFIX_LENGTH
        {
            return Err(SynthError::validation(
                COMPONENT,
                ValidationError::AddressSpaceTooSmall {
                    cidr: cidr.to_string(),
                    required,
                    prefix_length: SUBNET_PREFIX_LENGTH,
                },
            ));
        }

        let vpc = graph.declare(declaration(
            ResourceKind::Vpc,
            "Vpc",
            json!({
                "CidrBlock": cidr.to_string(),
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [name_tag(&env.prefix.qualify("vpc"))],
            }),
        ))?;

        let gateway = graph.declare(declaration(
            ResourceKind::InternetGateway,
            "InternetGateway",
            json!({ "Tags": [name_tag(&env.prefix.qualify("igw"))] }),
        ))?;
        let attachment = graph.declare(declaration(
            ResourceKind::VpcGatewayAttachment,
            "GatewayAttachment",
            json!({
                "VpcId": vpc.reference(),
                "InternetGatewayId": gateway.reference(),
            }),
        ))?;

        let mut index = 0u32;
        let mut public_subnets = Vec::with_capacity(zones.len());
        for (n, zone) in zones.iter().enumerate() {
            let block = carve(cidr, index)?;
            index += 1;
            let subnet = self.declare_subnet(graph, &vpc, SubnetTier::Public, n + 1, zone, block)?;
            let table = self.declare_route_table(graph, &vpc, &subnet)?;
            graph.declare(
                declaration(
                    ResourceKind::Route,
                    &format!("PublicSubnet{}DefaultRoute", n + 1),
                    json!({
                        "RouteTableId": table.reference(),
                        "DestinationCidrBlock": Ipv4Cidr::any_ipv4().to_string(),
                        "GatewayId": gateway.reference(),
                    }),
                )
                .depends_on(&attachment),
            )?;
            public_subnets.push(subnet);
        }

        // Single NAT gateway in the first public subnet
        let nat_subnet = &public_subnets[0];
        let eip = graph.declare(
            declaration(
                ResourceKind::Eip,
                "NatEip",
                json!({
                    "Domain": "vpc",
                    "Tags": [name_tag(&env.prefix.qualify("nat-eip"))],
                }),
            )
            .depends_on(&attachment),
        )?;
        let nat = graph.declare(declaration(
            ResourceKind::NatGateway,
            "NatGateway",
            json!({
                "SubnetId": nat_subnet.handle.reference(),
                "AllocationId": eip.attribute("AllocationId")?,
                "Tags": [name_tag(&env.prefix.qualify("nat"))],
            }),
        ))?;

        let mut private_subnets = Vec::with_capacity(zones.len());
        for (n, zone) in zones.iter().enumerate() {
            let block = carve(cidr, index)?;
            index += 1;
            let subnet = self.declare_subnet(graph, &vpc, SubnetTier::Private, n + 1, zone, block)?;
            let table = self.declare_route_table(graph, &vpc, &subnet)?;
            graph.declare(declaration(
                ResourceKind::Route,
                &format!("PrivateSubnet{}DefaultRoute", n + 1),
                json!({
                    "RouteTableId": table.reference(),
                    "DestinationCidrBlock": Ipv4Cidr::any_ipv4().to_string(),
                    "NatGatewayId": nat.reference(),
                }),
            ))?;
            private_subnets.push(subnet);
        }

        let log_group_name = env.prefix.log_group("vpc", "flowlogs");
        let log_group = graph.declare_named(
            declaration(
                ResourceKind::LogGroup,
                "FlowLogGroup",
                json!({
                    "LogGroupName": log_group_name,
                    "RetentionInDays": env.log_retention.days(),
                }),
            )
            .with_removal_policy(RemovalPolicy::Destroy),
            log_group_name.clone(),
        )?;

        let role = graph.declare(declaration(
            ResourceKind::IamRole,
            "FlowLogRole",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "vpc-flow-logs.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "Policies": [{
                    "PolicyName": "FlowLogDelivery",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Action": [
                                "logs:CreateLogStream",
                                "logs:PutLogEvents",
                                "logs:DescribeLogStreams",
                            ],
                            "Resource": log_group.attribute("Arn")?,
                        }, {
                            "Effect": "Allow",
                            "Action": "iam:PassRole",
                            "Resource": "*",
                        }],
                    },
                }],
            }),
        ))?;

        graph.declare(declaration(
            ResourceKind::FlowLog,
            "FlowLog",
            json!({
                "ResourceId": vpc.reference(),
                "ResourceType": "VPC",
                "TrafficType": "ALL",
                "LogDestinationType": "cloud-watch-logs",
                "LogGroupName": log_group.reference(),
                "DeliverLogsPermissionArn": role.attribute("Arn")?,
            }),
        ))?;

        info!(
            component = %COMPONENT,
            stage = %env.stage_name,
            cidr = %cidr,
            public = public_subnets.len(),
            private = private_subnets.len(),
            "declared network topology"
        );

        Ok(NetworkTopology::from_parts(
            vpc,
            cidr,
            public_subnets,
            private_subnets,
            log_group,
        ))
    }

    fn declare_subnet(
        &self,
        graph: &mut StackGraph,
        vpc: &ResourceHandle,
        tier: SubnetTier,
        ordinal: usize,
        zone: &str,
        block: Ipv4Cidr,
    ) -> SynthResult<Subnet> {
        let label = match tier {
            SubnetTier::Public => "Public",
            SubnetTier::Private => "Private",
        };
        let handle = graph.declare(declaration(
            ResourceKind::Subnet,
            &format!("{}Subnet{}", label, ordinal),
            json!({
                "VpcId": vpc.reference(),
                "CidrBlock": block.to_string(),
                "AvailabilityZone": zone,
                "MapPublicIpOnLaunch": tier == SubnetTier::Public,
                "Tags": [name_tag(&self.env.prefix.qualify(&format!(
                    "{}-{}",
                    tier.as_str(),
                    zone
                )))],
            }),
        ))?;
        graph.record_subnet(&handle, tier);

        Ok(Subnet {
            handle,
            cidr: block,
            availability_zone: zone.to_string(),
            tier,
        })
    }

    fn declare_route_table(
        &self,
        graph: &mut StackGraph,
        vpc: &ResourceHandle,
        subnet: &Subnet,
    ) -> SynthResult<ResourceHandle> {
        let local = subnet.handle.id().as_str().trim_start_matches(SCOPE);
        let table = graph.declare(declaration(
            ResourceKind::RouteTable,
            &format!("{}RouteTable", local),
            json!({ "VpcId": vpc.reference() }),
        ))?;
        graph.declare(declaration(
            ResourceKind::SubnetRouteTableAssociation,
            &format!("{}RouteTableAssociation", local),
            json!({
                "RouteTableId": table.reference(),
                "SubnetId": subnet.handle.reference(),
            }),
        ))?;
        Ok(table)
    }
}

fn declaration(kind: ResourceKind, name: &str, properties: Value) -> ResourceDeclaration {
    ResourceDeclaration::new(COMPONENT, kind, LogicalId::scoped(SCOPE, name), properties)
}

fn name_tag(name: &str) -> Value {
    json!({ "Key": "Name", "Value": name })
}

fn carve(cidr: Ipv4Cidr, index: u32) -> SynthResult<Ipv4Cidr> {
    cidr.subnet(SUBNET_PREFIX_LENGTH, index)
        .map_err(|e| SynthError::validation(COMPONENT, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvironmentConfigResolver, Stage};

    fn env(cidr: &str) -> EnvironmentDescriptor {
        EnvironmentConfigResolver::default()
            .resolve(Stage::Dev)
            .unwrap()
            .with_network_cidr(Ipv4Cidr::new(cidr).unwrap())
    }

    #[test]
    fn test_subnet_layout() {
        let env = env("10.0.0.0/16");
        let mut graph = StackGraph::new();
        let topology = NetworkTopologyBuilder::new(&env).build(&mut graph).unwrap();

        let public: Vec<String> = topology
            .public_subnets()
            .unwrap()
            .iter()
            .map(|s| s.cidr.to_string())
            .collect();
        let private: Vec<String> = topology
            .private_subnets()
            .unwrap()
            .iter()
            .map(|s| s.cidr.to_string())
            .collect();

        assert_eq!(public, vec!["10.0.0.0/24", "10.0.1.0/24"]);
        assert_eq!(private, vec!["10.0.2.0/24", "10.0.3.0/24"]);
        assert_eq!(topology.private_subnets().unwrap()[1].availability_zone, "eu-central-1b");
        assert_eq!(graph.subnet_tiers().len(), 4);
    }

    #[test]
    fn test_single_nat_gateway_shared() {
        let env = env("10.0.0.0/16");
        let mut graph = StackGraph::new();
        NetworkTopologyBuilder::new(&env).build(&mut graph).unwrap();

        let nats: Vec<_> = graph
            .resources()
            .iter()
            .filter(|r| r.kind == ResourceKind::NatGateway)
            .collect();
        assert_eq!(nats.len(), 1);
        assert_eq!(nats[0].properties["SubnetId"], json!({"Ref": "NetworkPublicSubnet1"}));

        let nat_routes = graph
            .resources()
            .iter()
            .filter(|r| r.properties.get("NatGatewayId").is_some())
            .count();
        assert_eq!(nat_routes, 2);
    }

    #[test]
    fn test_flow_log() {
        let env = env("10.0.0.0/16");
        let mut graph = StackGraph::new();
        let topology = NetworkTopologyBuilder::new(&env).build(&mut graph).unwrap();

        let sink = graph
            .resources()
            .iter()
            .find(|r| r.id == *topology.flow_log_sink().id())
            .unwrap();
        assert_eq!(sink.properties["LogGroupName"], "/aws/vpc/dev/flowlogs");
        assert_eq!(sink.properties["RetentionInDays"], 1);

        let flow_log = graph
            .resources()
            .iter()
            .find(|r| r.kind == ResourceKind::FlowLog)
            .unwrap();
        assert_eq!(flow_log.properties["TrafficType"], "ALL");
    }

    #[test]
    fn test_address_space_too_small() {
        let env = env("10.0.0.0/23");
        let mut graph = StackGraph::new();
        let err = NetworkTopologyBuilder::new(&env).build(&mut graph).unwrap_err();
        assert!(matches!(
            err,
            SynthError::Validation {
                source: ValidationError::AddressSpaceTooSmall { .. },
                ..
            }
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_address_space_too_large() {
        for block in ["0.0.0.0/0", "10.0.0.0/8", "10.0.0.0/15"] {
            let env = env(block);
            let mut graph = StackGraph::new();
            let err = NetworkTopologyBuilder::new(&env).build(&mut graph).unwrap_err();
            assert!(
                matches!(
                    err,
                    SynthError::Validation {
                        source: ValidationError::AddressSpaceTooLarge { .. },
                        ..
                    }
                ),
                "{} accepted",
                block
            );
            assert!(graph.is_empty());
        }

        let mut graph = StackGraph::new();
        assert!(NetworkTopologyBuilder::new(&env("10.0.0.0/16")).build(&mut graph).is_ok());
        let mut graph = StackGraph::new();
        assert!(NetworkTopologyBuilder::new(&env("10.0.0.0/22")).build(&mut graph).is_ok());
    }

    #[test]
    fn test_insufficient_zones() {
        let mut env = env("10.0.0.0/16");
        env.availability_zones.truncate(1);
        let mut graph = StackGraph::new();
        let err = NetworkTopologyBuilder::new(&env).build(&mut graph).unwrap_err();
        assert!(err.is_validation());
        assert!(graph.is_empty());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Compute cluster builder
//!
//! ECS cluster, instance fleet and the internet-facing load balancer in
//! front of it. This is where the fleet and public identities are minted.

use serde_json::{json, Value};
use tracing::info;

use super::network::{subnet_ids, subnet_refs, NetworkTopology};
use super::security::{declare_security_group, FleetIdentity, PublicIdentity};
use crate::config::EnvironmentDescriptor;
use crate::domain::{Ipv4Cidr, LogicalId, Placement, PortRange, ResourceKind, SubnetTier};
use crate::errors::{Component, SynthError, SynthResult};
use crate::provisioning::{
    join, pseudo, ResourceDeclaration, ResourceHandle, StackGraph, StackOutput,
};

const SCOPE: &str = "Compute";
const COMPONENT: Component = Component::Compute;

/// ECS-optimized Amazon Linux 2 image, resolved at deploy time
pub const ECS_OPTIMIZED_IMAGE: &str =
    "{{resolve:ssm:/aws/service/ecs/optimized-ami/amazon-linux-2/recommended/image_id}}";

/// Managed policies attached to the fleet role
pub const FLEET_MANAGED_POLICIES: [&str; 2] = [
    "AmazonSSMManagedInstanceCore",
    "service-role/AmazonEC2ContainerServiceforEC2Role",
];

/// Instance role assumed by the fleet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRole(ResourceHandle);

impl ExecutionRole {
    pub fn handle(&self) -> &ResourceHandle {
        &self.0
    }

    /// `Arn` attribute token
    pub fn arn(&self) -> SynthResult<Value> {
        self.0.attribute("Arn")
    }
}

/// Internet-facing application load balancer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancer {
    pub handle: ResourceHandle,
    pub identity: PublicIdentity,
}

/// Output of the compute builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeCluster {
    pub ecs_cluster: ResourceHandle,
    pub fleet: ResourceHandle,
    pub fleet_identity: FleetIdentity,
    pub execution_role: ExecutionRole,
    pub load_balancer: LoadBalancer,
}

/// Builds the compute cluster for one environment
pub struct ComputeClusterBuilder<'a> {
    env: &'a EnvironmentDescriptor,
}

impl<'a> ComputeClusterBuilder<'a> {
    pub fn new(env: &'a EnvironmentDescriptor) -> Self {
        Self { env }
    }

    /// Declare the cluster, fleet and load balancer
    pub fn build(&self, graph: &mut StackGraph, network: &NetworkTopology) -> SynthResult<ComputeCluster> {
        let env = self.env;
        let public = network
            .public_subnets()
            .map_err(|e| SynthError::validation(COMPONENT, e))?;
        let private = network
            .private_subnets()
            .map_err(|e| SynthError::validation(COMPONENT, e))?;

        let cluster_name = env.prefix.qualify("cluster");
        let ecs_cluster = graph.declare_named(
            declaration(
                ResourceKind::EcsCluster,
                "EcsCluster",
                json!({ "ClusterName": cluster_name }),
            ),
            cluster_name.clone(),
        )?;

        let lb_group = env.prefix.qualify("sg-lb");
        let mut lb_identity = PublicIdentity::new(declare_security_group(
            graph,
            COMPONENT,
            LogicalId::scoped(SCOPE, "LoadBalancerSecurityGroup"),
            &lb_group,
            "Load balancer security group",
            network.vpc(),
        )?);
        let fleet_group = env.prefix.qualify("sg-fleet");
        let mut fleet_identity = FleetIdentity::new(declare_security_group(
            graph,
            COMPONENT,
            LogicalId::scoped(SCOPE, "FleetSecurityGroup"),
            &fleet_group,
            "Compute fleet security group",
            network.vpc(),
        )?);

        lb_identity.allow_from(
            graph,
            COMPONENT,
            &Ipv4Cidr::any_ipv4(),
            PortRange::tcp(env.container.listener_port),
            "Allow from anyone on the listener port",
        )?;
        fleet_identity.allow_from(
            graph,
            COMPONENT,
            &lb_identity,
            PortRange::tcp(env.container.application_port),
            "Load balancer to target",
        )?;

        let policies: Vec<Value> = FLEET_MANAGED_POLICIES
            .iter()
            .copied()
            .map(managed_policy_arn)
            .collect();
        let role = graph.declare(declaration(
            ResourceKind::IamRole,
            "FleetRole",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "ec2.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "ManagedPolicyArns": policies,
            }),
        ))?;
        let execution_role = ExecutionRole(role);

        let profile = graph.declare(declaration(
            ResourceKind::InstanceProfile,
            "InstanceProfile",
            json!({ "Roles": [execution_role.handle().reference()] }),
        ))?;

        let template_name = env.prefix.qualify("fleet-template");
        let user_data = join(vec![
            json!("#!/bin/bash\necho ECS_CLUSTER="),
            ecs_cluster.reference(),
            json!(" >> /etc/ecs/ecs.config\n"),
        ]);
        let launch_template = graph.declare_named(
            declaration(
                ResourceKind::LaunchTemplate,
                "LaunchTemplate",
                json!({
                    "LaunchTemplateName": template_name,
                    "LaunchTemplateData": {
                        "ImageId": ECS_OPTIMIZED_IMAGE,
                        "InstanceType": env.compute.instance_class,
                        "IamInstanceProfile": { "Arn": profile.attribute("Arn")? },
                        "SecurityGroupIds": [fleet_identity.group_id()],
                        "UserData": { "Fn::Base64": user_data },
                    },
                }),
            )
            .depends_on(execution_role.handle()),
            template_name.clone(),
        )?;

        let fleet_name = env.prefix.qualify("fleet");
        let fleet = graph.declare_named(
            declaration(
                ResourceKind::AutoScalingGroup,
                "Fleet",
                json!({
                    "AutoScalingGroupName": fleet_name,
                    "MinSize": env.compute.min_capacity.to_string(),
                    "MaxSize": env.compute.max_capacity.to_string(),
                    "LaunchTemplate": {
                        "LaunchTemplateId": launch_template.reference(),
                        "Version": launch_template.attribute("LatestVersionNumber")?,
                    },
                    "VPCZoneIdentifier": subnet_refs(private),
                }),
            ),
            fleet_name.clone(),
        )?;
        graph.record_placement(Placement {
            resource: fleet.id().clone(),
            required: SubnetTier::Private,
            subnets: subnet_ids(private),
        });

        let lb_name = env.prefix.qualify("alb");
        let lb = graph.declare_named(
            declaration(
                ResourceKind::LoadBalancer,
                "LoadBalancer",
                json!({
                    "Name": lb_name,
                    "Type": "application",
                    "Scheme": "internet-facing",
                    "Subnets": subnet_refs(public),
                    "SecurityGroups": [lb_identity.group_id()],
                    "LoadBalancerAttributes": [{
                        "Key": "deletion_protection.enabled",
                        "Value": "false",
                    }],
                }),
            ),
            lb_name.clone(),
        )?;
        graph.record_placement(Placement {
            resource: lb.id().clone(),
            required: SubnetTier::Public,
            subnets: subnet_ids(public),
        });

        graph.add_output(
            COMPONENT,
            StackOutput::new("LoadBalancerDns", lb.attribute("DNSName")?)
                .exported_as(env.prefix.qualify("LoadBalancerDns"))
                .described("Public DNS name of the application load balancer"),
        )?;
        graph.add_output(
            COMPONENT,
            StackOutput::new("FleetRoleArn", execution_role.arn()?)
                .exported_as(env.prefix.qualify("FleetRoleArn")),
        )?;

        info!(
            component = %COMPONENT,
            stage = %env.stage_name,
            instance_class = %env.compute.instance_class,
            "declared compute cluster"
        );

        Ok(ComputeCluster {
            ecs_cluster,
            fleet,
            fleet_identity,
            execution_role,
            load_balancer: LoadBalancer {
                handle: lb,
                identity: lb_identity,
            },
        })
    }
}

fn declaration(kind: ResourceKind, name: &str, properties: Value) -> ResourceDeclaration {
    ResourceDeclaration::new(COMPONENT, kind, LogicalId::scoped(SCOPE, name), properties)
}

fn managed_policy_arn(policy: &str) -> Value {
    join(vec![
        json!("arn:"),
        pseudo("Partition"),
        json!(format!(":iam::aws:policy/{}", policy)),
    ])
}

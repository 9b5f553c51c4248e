// Copyright (c) 2025 - Cowboy AI, Inc.
//! Container service builder
//!
//! Runs the application container on the compute fleet behind the public
//! listener. The service reuses the fleet identity rather than minting one.

use serde_json::{json, Value};
use tracing::info;

use super::compute::ComputeCluster;
use super::network::{subnet_ids, subnet_refs, NetworkTopology};
use crate::config::EnvironmentDescriptor;
use crate::domain::invariants::validate_health_check;
use crate::domain::{LogicalId, Placement, RemovalPolicy, ResourceKind, SubnetTier};
use crate::errors::{Component, SynthError, SynthResult};
use crate::provisioning::{pseudo, ResourceDeclaration, ResourceHandle, StackGraph};

const SCOPE: &str = "Service";
const COMPONENT: Component = Component::ContainerService;

/// Name of the single application container
pub const CONTAINER_NAME: &str = "application";

/// Output of the container service builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerService {
    pub service: ResourceHandle,
    pub task_definition: ResourceHandle,
    pub target_group: ResourceHandle,
    pub listener: ResourceHandle,
    pub capacity_provider: ResourceHandle,
}

/// Builds the container service for one environment
pub struct ContainerServiceBuilder<'a> {
    env: &'a EnvironmentDescriptor,
}

impl<'a> ContainerServiceBuilder<'a> {
    pub fn new(env: &'a EnvironmentDescriptor) -> Self {
        Self { env }
    }

    /// Declare the service and wire it to the load balancer
    ///
    /// # Errors
    /// - `Validation` when the health check timing is out of bounds; nothing
    ///   is declared in that case
    pub fn build(
        &self,
        graph: &mut StackGraph,
        network: &NetworkTopology,
        compute: &ComputeCluster,
    ) -> SynthResult<ContainerService> {
        let env = self.env;
        let settings = &env.container;
        let health = &settings.health_check;

        validate_health_check(health.interval_secs, health.timeout_secs)
            .map_err(|e| SynthError::validation(COMPONENT, e))?;
        let private = network
            .private_subnets()
            .map_err(|e| SynthError::validation(COMPONENT, e))?;

        let provider_name = env.prefix.qualify("capacity-provider");
        let capacity_provider = graph.declare_named(
            declaration(
                ResourceKind::CapacityProvider,
                "CapacityProvider",
                json!({
                    "Name": provider_name,
                    "AutoScalingGroupProvider": {
                        "AutoScalingGroupArn": compute.fleet.reference(),
                        "ManagedScaling": {
                            "Status": "ENABLED",
                            "TargetCapacity": 100,
                        },
                        "ManagedTerminationProtection": "DISABLED",
                    },
                }),
            ),
            provider_name.clone(),
        )?;
        let strategy = json!([{
            "CapacityProvider": capacity_provider.reference(),
            "Weight": 1,
        }]);
        let associations = graph.declare(declaration(
            ResourceKind::ClusterCapacityProviderAssociations,
            "CapacityProviderAssociations",
            json!({
                "Cluster": compute.ecs_cluster.reference(),
                "CapacityProviders": [capacity_provider.reference()],
                "DefaultCapacityProviderStrategy": strategy,
            }),
        ))?;

        let log_group_name = env.prefix.log_group("ecs", "service");
        let log_group = graph.declare_named(
            declaration(
                ResourceKind::LogGroup,
                "LogGroup",
                json!({
                    "LogGroupName": log_group_name,
                    "RetentionInDays": env.log_retention.days(),
                }),
            )
            .with_removal_policy(RemovalPolicy::Destroy),
            log_group_name.clone(),
        )?;

        let task_role = graph.declare(declaration(
            ResourceKind::IamRole,
            "TaskRole",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "ecs-tasks.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
            }),
        ))?;

        let family = env.prefix.qualify("application");
        let task_definition = graph.declare_named(
            declaration(
                ResourceKind::TaskDefinition,
                "TaskDefinition",
                json!({
                    "Family": family,
                    "NetworkMode": "awsvpc",
                    "RequiresCompatibilities": ["EC2"],
                    "TaskRoleArn": task_role.attribute("Arn")?,
                    "ContainerDefinitions": [{
                        "Name": CONTAINER_NAME,
                        "Image": settings.image,
                        "Memory": settings.memory_limit_mib,
                        "Essential": true,
                        "PortMappings": [{
                            "ContainerPort": settings.application_port,
                            "Protocol": "tcp",
                        }],
                        "LogConfiguration": {
                            "LogDriver": "awslogs",
                            "Options": {
                                "awslogs-group": log_group.reference(),
                                "awslogs-stream-prefix": env.stage_name,
                                "awslogs-region": pseudo("Region"),
                            },
                        },
                    }],
                }),
            ),
            family.clone(),
        )?;

        let target_group_name = env.prefix.qualify("tg");
        let target_group = graph.declare_named(
            declaration(
                ResourceKind::TargetGroup,
                "TargetGroup",
                json!({
                    "Name": target_group_name,
                    "TargetType": "ip",
                    "Port": settings.application_port,
                    "Protocol": "HTTP",
                    "VpcId": network.vpc().reference(),
                    "HealthCheckEnabled": true,
                    "HealthCheckPath": health.path,
                    "HealthCheckIntervalSeconds": health.interval_secs,
                    "HealthCheckTimeoutSeconds": health.timeout_secs,
                }),
            ),
            target_group_name.clone(),
        )?;

        let listener = graph.declare(declaration(
            ResourceKind::Listener,
            "PublicListener",
            json!({
                "LoadBalancerArn": compute.load_balancer.handle.reference(),
                "Port": settings.listener_port,
                "Protocol": "HTTP",
                "DefaultActions": [{
                    "Type": "forward",
                    "TargetGroupArn": target_group.reference(),
                }],
            }),
        ))?;

        let service_name = env.prefix.qualify("service");
        let service = graph.declare_named(
            declaration(
                ResourceKind::EcsService,
                "Service",
                json!({
                    "ServiceName": service_name,
                    "Cluster": compute.ecs_cluster.reference(),
                    "TaskDefinition": task_definition.reference(),
                    "DesiredCount": settings.desired_count,
                    "CapacityProviderStrategy": strategy,
                    "NetworkConfiguration": {
                        "AwsvpcConfiguration": {
                            "AssignPublicIp": "DISABLED",
                            "SecurityGroups": [compute.fleet_identity.group_id()],
                            "Subnets": subnet_refs(private),
                        },
                    },
                    "LoadBalancers": [{
                        "ContainerName": CONTAINER_NAME,
                        "ContainerPort": settings.application_port,
                        "TargetGroupArn": target_group.reference(),
                    }],
                }),
            )
            .depends_on(&listener)
            .depends_on(&associations),
            service_name.clone(),
        )?;
        graph.record_placement(Placement {
            resource: service.id().clone(),
            required: SubnetTier::Private,
            subnets: subnet_ids(private),
        });

        info!(
            component = %COMPONENT,
            stage = %env.stage_name,
            image = %settings.image,
            health_check = %health.path,
            "declared container service"
        );

        Ok(ContainerService {
            service,
            task_definition,
            target_group,
            listener,
            capacity_provider,
        })
    }
}

fn declaration(kind: ResourceKind, name: &str, properties: Value) -> ResourceDeclaration {
    ResourceDeclaration::new(COMPONENT, kind, LogicalId::scoped(SCOPE, name), properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvironmentConfigResolver, Stage};
    use crate::constructs::compute::ComputeClusterBuilder;
    use crate::constructs::network::NetworkTopologyBuilder;
    use crate::domain::ValidationError;

    fn prepare(env: &EnvironmentDescriptor) -> (StackGraph, NetworkTopology, ComputeCluster) {
        let mut graph = StackGraph::new();
        let network = NetworkTopologyBuilder::new(env).build(&mut graph).unwrap();
        let compute = ComputeClusterBuilder::new(env).build(&mut graph, &network).unwrap();
        (graph, network, compute)
    }

    fn properties<'g>(graph: &'g StackGraph, handle: &ResourceHandle) -> &'g Value {
        &graph
            .resources()
            .iter()
            .find(|r| r.id == *handle.id())
            .unwrap()
            .properties
    }

    #[test]
    fn test_service_wiring() {
        let env = EnvironmentConfigResolver::default().resolve(Stage::Dev).unwrap();
        let (mut graph, network, compute) = prepare(&env);
        let service = ContainerServiceBuilder::new(&env)
            .build(&mut graph, &network, &compute)
            .unwrap();

        let listener = properties(&graph, &service.listener);
        assert_eq!(listener["Port"], 80);
        assert_eq!(
            listener["DefaultActions"][0]["TargetGroupArn"],
            service.target_group.reference()
        );

        let target_group = properties(&graph, &service.target_group);
        assert_eq!(target_group["TargetType"], "ip");
        assert_eq!(target_group["HealthCheckPath"], "/");
        assert_eq!(target_group["HealthCheckIntervalSeconds"], 60);
        assert_eq!(target_group["HealthCheckTimeoutSeconds"], 5);

        let declared = graph
            .resources()
            .iter()
            .find(|r| r.id == *service.service.id())
            .unwrap();
        assert!(declared.depends_on.contains(service.listener.id()));
        assert_eq!(
            declared.properties["NetworkConfiguration"]["AwsvpcConfiguration"]["SecurityGroups"],
            json!([compute.fleet_identity.group_id()])
        );
    }

    #[test]
    fn test_task_definition() {
        let env = EnvironmentConfigResolver::default().resolve(Stage::Dev).unwrap();
        let (mut graph, network, compute) = prepare(&env);
        let service = ContainerServiceBuilder::new(&env)
            .build(&mut graph, &network, &compute)
            .unwrap();

        let task = properties(&graph, &service.task_definition);
        assert_eq!(task["NetworkMode"], "awsvpc");
        assert_eq!(task["RequiresCompatibilities"], json!(["EC2"]));
        let container = &task["ContainerDefinitions"][0];
        assert_eq!(container["Image"], "dockware/play:latest");
        assert_eq!(container["Memory"], 256);
        assert_eq!(container["LogConfiguration"]["Options"]["awslogs-stream-prefix"], "dev");
    }

    #[test]
    fn test_no_new_identity() {
        let env = EnvironmentConfigResolver::default().resolve(Stage::Dev).unwrap();
        let (mut graph, network, compute) = prepare(&env);
        let groups_before = graph
            .resources()
            .iter()
            .filter(|r| r.kind == ResourceKind::SecurityGroup)
            .count();
        ContainerServiceBuilder::new(&env)
            .build(&mut graph, &network, &compute)
            .unwrap();
        let groups_after = graph
            .resources()
            .iter()
            .filter(|r| r.kind == ResourceKind::SecurityGroup)
            .count();
        assert_eq!(groups_before, groups_after);
    }

    #[test]
    fn test_invalid_health_check() {
        let mut env = EnvironmentConfigResolver::default().resolve(Stage::Dev).unwrap();
        env.container.health_check.timeout_secs = 60;
        let (mut graph, network, compute) = prepare(&env);
        let before = graph.len();

        let err = ContainerServiceBuilder::new(&env)
            .build(&mut graph, &network, &compute)
            .unwrap_err();
        assert!(matches!(
            err,
            SynthError::Validation {
                component: Component::ContainerService,
                source: ValidationError::InvalidHealthCheck(_),
            }
        ));
        assert_eq!(graph.len(), before);
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cache cluster builder

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::network::{subnet_ids, subnet_refs, NetworkTopology};
use super::security::{declare_security_group, FleetIdentity, ServiceIdentity};
use crate::config::EnvironmentDescriptor;
use crate::domain::{
    LogicalId, Placement, PortRange, RemovalPolicy, ResourceKind, SubnetTier, ValidationError,
};
use crate::errors::{Component, SynthError, SynthResult};
use crate::provisioning::{ResourceDeclaration, ResourceHandle, StackGraph, StackOutput};

const SCOPE: &str = "Cache";
const COMPONENT: Component = Component::Cache;

/// Redis port
pub const REDIS_PORT: u16 = 6379;

/// Largest replica count per node group
pub const MAX_REPLICAS_PER_NODE_GROUP: u32 = 5;

/// Cache layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheTopology {
    /// One node, no failover
    SingleNode,
    /// Replication group with automatic failover
    Replicated {
        node_groups: u32,
        replicas_per_node_group: u32,
    },
}

impl CacheTopology {
    /// Check the layout is one the cache service accepts
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Self::SingleNode => Ok(()),
            Self::Replicated {
                node_groups,
                replicas_per_node_group,
            } => {
                if node_groups == 0 {
                    return Err(ValidationError::InvalidReplication(
                        "at least one node group is required".to_string(),
                    ));
                }
                if replicas_per_node_group == 0 || replicas_per_node_group > MAX_REPLICAS_PER_NODE_GROUP {
                    return Err(ValidationError::InvalidReplication(format!(
                        "replicas per node group must be 1-{}, got {}",
                        MAX_REPLICAS_PER_NODE_GROUP, replicas_per_node_group
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Output of the cache builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCluster {
    pub handle: ResourceHandle,
    pub identity: ServiceIdentity,
    pub endpoint_address: Value,
    pub endpoint_port: Value,
}

/// Builds the cache cluster for one environment
pub struct CacheClusterBuilder<'a> {
    env: &'a EnvironmentDescriptor,
}

impl<'a> CacheClusterBuilder<'a> {
    pub fn new(env: &'a EnvironmentDescriptor) -> Self {
        Self { env }
    }

    /// Declare the cache, reachable from the fleet only
    pub fn build(
        &self,
        graph: &mut StackGraph,
        network: &NetworkTopology,
        fleet: &FleetIdentity,
    ) -> SynthResult<CacheCluster> {
        let env = self.env;
        let settings = &env.cache;
        let private = network
            .private_subnets()
            .map_err(|e| SynthError::validation(COMPONENT, e))?;
        settings
            .topology
            .validate()
            .map_err(|e| SynthError::validation(COMPONENT, e))?;

        let subnet_group_name = env.prefix.qualify("redis-subnet-group");
        let subnet_group = graph.declare_named(
            declaration(
                ResourceKind::CacheSubnetGroup,
                "SubnetGroup",
                json!({
                    "CacheSubnetGroupName": subnet_group_name,
                    "Description": format!("Redis subnet group for {}", env.stage_name),
                    "SubnetIds": subnet_refs(private),
                }),
            ),
            subnet_group_name.clone(),
        )?;

        let group_name = env.prefix.qualify("sg-redis");
        let mut identity = ServiceIdentity::new(declare_security_group(
            graph,
            COMPONENT,
            LogicalId::scoped(SCOPE, "SecurityGroup"),
            &group_name,
            "Security group for the redis cluster",
            network.vpc(),
        )?);
        identity.allow_from(graph, COMPONENT, fleet, PortRange::tcp(REDIS_PORT), "Allow from the fleet")?;

        let log_group_name = env.prefix.log_group("redis", "slow-logs");
        let log_group = graph.declare_named(
            declaration(
                ResourceKind::LogGroup,
                "SlowLogGroup",
                json!({
                    "LogGroupName": log_group_name,
                    "RetentionInDays": env.log_retention.days(),
                }),
            )
            .with_removal_policy(RemovalPolicy::Destroy),
            log_group_name.clone(),
        )?;

        let log_delivery = json!([{
            "DestinationDetails": {
                "CloudWatchLogsDetails": { "LogGroup": log_group.reference() },
            },
            "DestinationType": "cloudwatch-logs",
            "LogFormat": "json",
            "LogType": "slow-log",
        }]);

        let (handle, address, port) = match settings.topology {
            CacheTopology::SingleNode => {
                let cluster = graph.declare_named(
                    declaration(
                        ResourceKind::CacheCluster,
                        "Cluster",
                        json!({
                            "ClusterName": settings.cluster_name,
                            "CacheNodeType": settings.node_class,
                            "Engine": "redis",
                            "EngineVersion": settings.engine_version,
                            "NumCacheNodes": 1,
                            "CacheSubnetGroupName": subnet_group.reference(),
                            "VpcSecurityGroupIds": [identity.group_id()],
                            "LogDeliveryConfigurations": log_delivery,
                        }),
                    )
                    .depends_on(&subnet_group),
                    settings.cluster_name.clone(),
                )?;
                let address = cluster.attribute("RedisEndpoint.Address")?;
                let port = cluster.attribute("RedisEndpoint.Port")?;
                (cluster, address, port)
            }
            CacheTopology::Replicated {
                node_groups,
                replicas_per_node_group,
            } => {
                let group = graph.declare_named(
                    declaration(
                        ResourceKind::ReplicationGroup,
                        "ReplicationGroup",
                        json!({
                            "ReplicationGroupId": settings.cluster_name,
                            "ReplicationGroupDescription": format!("Redis replication group for {}", env.stage_name),
                            "CacheNodeType": settings.node_class,
                            "Engine": "redis",
                            "EngineVersion": settings.engine_version,
                            "NumNodeGroups": node_groups,
                            "ReplicasPerNodeGroup": replicas_per_node_group,
                            "AutomaticFailoverEnabled": true,
                            "MultiAZEnabled": true,
                            "AutoMinorVersionUpgrade": true,
                            "CacheSubnetGroupName": subnet_group.reference(),
                            "SecurityGroupIds": [identity.group_id()],
                            "LogDeliveryConfigurations": log_delivery,
                        }),
                    )
                    .depends_on(&subnet_group),
                    settings.cluster_name.clone(),
                )?;
                // Cluster mode exposes a configuration endpoint instead of a primary one
                let endpoint = if node_groups > 1 {
                    "ConfigurationEndPoint"
                } else {
                    "PrimaryEndPoint"
                };
                let address = group.attribute(&format!("{}.Address", endpoint))?;
                let port = group.attribute(&format!("{}.Port", endpoint))?;
                (group, address, port)
            }
        };

        graph.record_placement(Placement {
            resource: handle.id().clone(),
            required: SubnetTier::Private,
            subnets: subnet_ids(private),
        });

        graph.add_output(
            COMPONENT,
            StackOutput::new("RedisEndpointAddress", address.clone())
                .exported_as(env.prefix.qualify("RedisEndpointAddress")),
        )?;
        graph.add_output(
            COMPONENT,
            StackOutput::new("RedisEndpointPort", port.clone())
                .exported_as(env.prefix.qualify("RedisEndpointPort")),
        )?;

        info!(
            component = %COMPONENT,
            stage = %env.stage_name,
            cluster = %settings.cluster_name,
            kind = %handle.kind(),
            "declared cache"
        );

        Ok(CacheCluster {
            handle,
            identity,
            endpoint_address: address,
            endpoint_port: port,
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
    use crate::constructs::security::IngressSource;
    use crate::domain::Peer;

    fn build(topology: CacheTopology) -> SynthResult<(StackGraph, CacheCluster, FleetIdentity)> {
        let env = EnvironmentConfigResolver::default()
            .resolve(Stage::Dev)
            .unwrap()
            .with_cache_topology(topology);
        let mut graph = StackGraph::new();
        let network = NetworkTopologyBuilder::new(&env).build(&mut graph)?;
        let compute = ComputeClusterBuilder::new(&env).build(&mut graph, &network)?;
        let cache = CacheClusterBuilder::new(&env).build(&mut graph, &network, &compute.fleet_identity)?;
        Ok((graph, cache, compute.fleet_identity))
    }

    #[test]
    fn test_single_node() {
        let (graph, cache, fleet) = build(CacheTopology::SingleNode).unwrap();
        assert_eq!(cache.handle.kind(), ResourceKind::CacheCluster);
        assert_eq!(
            cache.endpoint_address,
            json!({"Fn::GetAtt": ["CacheCluster", "RedisEndpoint.Address"]})
        );

        assert!(cache.identity.identity().allows(&fleet.peer(), REDIS_PORT));
        assert!(!cache.identity.identity().allows(&Peer::any_ipv4(), REDIS_PORT));

        let cluster = graph.resources().iter().find(|r| r.id == *cache.handle.id()).unwrap();
        assert_eq!(cluster.properties["ClusterName"], "dev-redis");
        assert_eq!(cluster.properties["CacheNodeType"], "cache.t2.micro");
        assert_eq!(
            cluster.properties["LogDeliveryConfigurations"][0]["LogType"],
            "slow-log"
        );
    }

    #[test]
    fn test_replicated() {
        let (_, cache, _) = build(CacheTopology::Replicated {
            node_groups: 3,
            replicas_per_node_group: 1,
        })
        .unwrap();
        assert_eq!(cache.handle.kind(), ResourceKind::ReplicationGroup);
        assert_eq!(
            cache.endpoint_port,
            json!({"Fn::GetAtt": ["CacheReplicationGroup", "ConfigurationEndPoint.Port"]})
        );
    }

    #[test]
    fn test_invalid_replication() {
        let err = build(CacheTopology::Replicated {
            node_groups: 1,
            replicas_per_node_group: 0,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            SynthError::Validation {
                component: Component::Cache,
                source: ValidationError::InvalidReplication(_),
            }
        ));
    }
}

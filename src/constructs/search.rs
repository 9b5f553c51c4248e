// Copyright (c) 2025 - Cowboy AI, Inc.
//! Search domain builder
//!
//! Single-node OpenSearch domain in the first private subnet. Fine-grained
//! access control names the fleet's execution role as master user, and the
//! domain access policy grants that same role.

use serde_json::{json, Value};
use tracing::info;

use super::compute::ExecutionRole;
use super::network::{subnet_ids, subnet_refs, NetworkTopology};
use super::security::{declare_security_group, FleetIdentity, ServiceIdentity};
use crate::config::EnvironmentDescriptor;
use crate::domain::{LogicalId, Placement, PortRange, RemovalPolicy, ResourceKind, SubnetTier};
use crate::errors::{Component, SynthError, SynthResult};
use crate::provisioning::{join, pseudo, ResourceDeclaration, ResourceHandle, StackGraph, StackOutput};

const SCOPE: &str = "Search";
const COMPONENT: Component = Component::Search;

/// HTTPS port of the domain endpoint
pub const HTTPS_PORT: u16 = 443;

/// Log types published by the domain and the log group each one lands in
const LOG_PUBLISHING: [(&str, &str, &str); 3] = [
    ("ES_APPLICATION_LOGS", "AppLogGroup", "app-logs"),
    ("SEARCH_SLOW_LOGS", "SlowSearchLogGroup", "slow-search-logs"),
    ("INDEX_SLOW_LOGS", "SlowIndexLogGroup", "slow-index-logs"),
];

/// Output of the search builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDomain {
    pub handle: ResourceHandle,
    pub identity: ServiceIdentity,
    pub endpoint: Value,
}

/// Builds the search domain for one environment
pub struct SearchDomainBuilder<'a> {
    env: &'a EnvironmentDescriptor,
}

impl<'a> SearchDomainBuilder<'a> {
    pub fn new(env: &'a EnvironmentDescriptor) -> Self {
        Self { env }
    }

    /// Declare the domain, reachable from the fleet only
    pub fn build(
        &self,
        graph: &mut StackGraph,
        network: &NetworkTopology,
        fleet: &FleetIdentity,
        role: &ExecutionRole,
    ) -> SynthResult<SearchDomain> {
        let env = self.env;
        let settings = &env.search;
        let private = network
            .private_subnets()
            .map_err(|e| SynthError::validation(COMPONENT, e))?;
        let placed = &private[..1];

        let group_name = env.prefix.qualify("sg-search");
        let mut identity = ServiceIdentity::new(declare_security_group(
            graph,
            COMPONENT,
            LogicalId::scoped(SCOPE, "SecurityGroup"),
            &group_name,
            "Security group for the search domain",
            network.vpc(),
        )?);
        identity.allow_from(
            graph,
            COMPONENT,
            fleet,
            PortRange::tcp(HTTPS_PORT),
            "Search requests from the fleet",
        )?;

        let mut log_groups = Vec::with_capacity(LOG_PUBLISHING.len());
        for (log_type, local_name, suffix) in LOG_PUBLISHING {
            let name = env.prefix.log_group("search", suffix);
            let group = graph.declare_named(
                declaration(
                    ResourceKind::LogGroup,
                    local_name,
                    json!({
                        "LogGroupName": name,
                        "RetentionInDays": env.log_retention.days(),
                    }),
                )
                .with_removal_policy(RemovalPolicy::Destroy),
                name.clone(),
            )?;
            log_groups.push((log_type, group));
        }

        let mut log_arns = Vec::with_capacity(log_groups.len());
        for (_, group) in &log_groups {
            log_arns.push(group.attribute("Arn")?);
        }
        let policy_name = env.prefix.qualify("search-log-policy");
        let log_policy = graph.declare_named(
            declaration(
                ResourceKind::LogResourcePolicy,
                "LogResourcePolicy",
                json!({
                    "PolicyName": policy_name,
                    "PolicyDocument": {
                        "Fn::Join": ["", [
                            "{\"Version\":\"2012-10-17\",\"Statement\":[{\"Effect\":\"Allow\",",
                            "\"Principal\":{\"Service\":\"es.amazonaws.com\"},",
                            "\"Action\":[\"logs:PutLogEvents\",\"logs:CreateLogStream\"],",
                            "\"Resource\":[\"",
                            { "Fn::Join": ["\",\"", log_arns] },
                            "\"]}]}",
                        ]],
                    },
                }),
            ),
            policy_name.clone(),
        )?;

        let mut log_options = serde_json::Map::new();
        for (log_type, group) in &log_groups {
            log_options.insert(
                log_type.to_string(),
                json!({
                    "Enabled": true,
                    "CloudWatchLogsLogGroupArn": group.attribute("Arn")?,
                }),
            );
        }

        let domain_arn = join(vec![
            json!("arn:"),
            pseudo("Partition"),
            json!(":es:"),
            pseudo("Region"),
            json!(":"),
            pseudo("AccountId"),
            json!(format!(":domain/{}/*", settings.domain_name)),
        ]);

        let domain = graph.declare_named(
            declaration(
                ResourceKind::SearchDomain,
                "Domain",
                json!({
                    "DomainName": settings.domain_name,
                    "EngineVersion": format!("OpenSearch_{}", settings.engine_version),
                    "ClusterConfig": {
                        "InstanceType": settings.instance_class,
                        "InstanceCount": 1,
                        "DedicatedMasterEnabled": false,
                        "ZoneAwarenessEnabled": false,
                    },
                    "EBSOptions": {
                        "EBSEnabled": true,
                        "VolumeSize": settings.volume_size_gib,
                        "VolumeType": "gp2",
                    },
                    "EncryptionAtRestOptions": { "Enabled": true },
                    "NodeToNodeEncryptionOptions": { "Enabled": true },
                    "DomainEndpointOptions": {
                        "EnforceHTTPS": true,
                        "TLSSecurityPolicy": "Policy-Min-TLS-1-0-2019-07",
                    },
                    "AdvancedSecurityOptions": {
                        "Enabled": true,
                        "InternalUserDatabaseEnabled": false,
                        "MasterUserOptions": { "MasterUserARN": role.arn()? },
                    },
                    "AccessPolicies": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "AWS": role.arn()? },
                            "Action": "es:*",
                            "Resource": domain_arn,
                        }],
                    },
                    "LogPublishingOptions": log_options,
                    "VPCOptions": {
                        "SubnetIds": subnet_refs(placed),
                        "SecurityGroupIds": [identity.group_id()],
                    },
                }),
            )
            .with_removal_policy(RemovalPolicy::Destroy)
            .depends_on(&log_policy),
            settings.domain_name.clone(),
        )?;
        graph.record_placement(Placement {
            resource: domain.id().clone(),
            required: SubnetTier::Private,
            subnets: subnet_ids(placed),
        });

        let endpoint = domain.attribute("DomainEndpoint")?;
        graph.add_output(
            COMPONENT,
            StackOutput::new("SearchDomainEndpoint", endpoint.clone())
                .exported_as(env.prefix.qualify("SearchDomainEndpoint")),
        )?;

        info!(
            component = %COMPONENT,
            stage = %env.stage_name,
            domain = %settings.domain_name,
            engine = %settings.engine_version,
            "declared search domain"
        );

        Ok(SearchDomain {
            handle: domain,
            identity,
            endpoint,
        })
    }
}

fn declaration(kind: ResourceKind, name: &str, properties: Value) -> ResourceDeclaration {
    ResourceDeclaration::new(COMPONENT, kind, LogicalId::scoped(SCOPE, name), properties)
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declared Resource Kind Taxonomy
//!
//! Defines the closed set of resource kinds the synthesizer can declare at
//! the provisioning boundary, along with the attributes each kind exports and
//! how it accepts tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    // Network
    Vpc,
    Subnet,
    InternetGateway,
    VpcGatewayAttachment,
    RouteTable,
    Route,
    SubnetRouteTableAssociation,
    Eip,
    NatGateway,
    FlowLog,

    // Security
    SecurityGroup,
    SecurityGroupIngress,

    // Identity
    IamRole,
    InstanceProfile,

    // Logging
    LogGroup,
    LogResourcePolicy,

    // Compute
    LaunchTemplate,
    AutoScalingGroup,
    LoadBalancer,
    TargetGroup,
    Listener,

    // Containers
    EcsCluster,
    CapacityProvider,
    ClusterCapacityProviderAssociations,
    TaskDefinition,
    EcsService,

    // Database
    DbSubnetGroup,
    DbParameterGroup,
    DbInstance,

    // Secrets
    Secret,
    SecretTargetAttachment,
    RotationSchedule,

    // Cache
    CacheSubnetGroup,
    CacheCluster,
    ReplicationGroup,

    // Search
    SearchDomain,
}

/// Resource category for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Network,
    Security,
    Identity,
    Logging,
    Compute,
    Container,
    Database,
    Secrets,
    Cache,
    Search,
}

/// How a kind accepts the stage tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSupport {
    /// Kind has no `Tags` property
    None,
    /// `Tags: [{Key, Value}]`
    KeyValueList,
    /// `Tags: [{Key, Value, PropagateAtLaunch}]`
    PropagateAtLaunch,
}

impl ResourceKind {
    /// Provider type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vpc => "AWS::EC2::VPC",
            Self::Subnet => "AWS::EC2::Subnet",
            Self::InternetGateway => "AWS::EC2::InternetGateway",
            Self::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            Self::RouteTable => "AWS::EC2::RouteTable",
            Self::Route => "AWS::EC2::Route",
            Self::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            Self::Eip => "AWS::EC2::EIP",
            Self::NatGateway => "AWS::EC2::NatGateway",
            Self::FlowLog => "AWS::EC2::FlowLog",
            Self::SecurityGroup => "AWS::EC2::SecurityGroup",
            Self::SecurityGroupIngress => "AWS::EC2::SecurityGroupIngress",
            Self::IamRole => "AWS::IAM::Role",
            Self::InstanceProfile => "AWS::IAM::InstanceProfile",
            Self::LogGroup => "AWS::Logs::LogGroup",
            Self::LogResourcePolicy => "AWS::Logs::ResourcePolicy",
            Self::LaunchTemplate => "AWS::EC2::LaunchTemplate",
            Self::AutoScalingGroup => "AWS::AutoScaling::AutoScalingGroup",
            Self::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            Self::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
            Self::Listener => "AWS::ElasticLoadBalancingV2::Listener",
            Self::EcsCluster => "AWS::ECS::Cluster",
            Self::CapacityProvider => "AWS::ECS::CapacityProvider",
            Self::ClusterCapacityProviderAssociations => {
                "AWS::ECS::ClusterCapacityProviderAssociations"
            }
            Self::TaskDefinition => "AWS::ECS::TaskDefinition",
            Self::EcsService => "AWS::ECS::Service",
            Self::DbSubnetGroup => "AWS::RDS::DBSubnetGroup",
            Self::DbParameterGroup => "AWS::RDS::DBParameterGroup",
            Self::DbInstance => "AWS::RDS::DBInstance",
            Self::Secret => "AWS::SecretsManager::Secret",
            Self::SecretTargetAttachment => "AWS::SecretsManager::SecretTargetAttachment",
            Self::RotationSchedule => "AWS::SecretsManager::RotationSchedule",
            Self::CacheSubnetGroup => "AWS::ElastiCache::SubnetGroup",
            Self::CacheCluster => "AWS::ElastiCache::CacheCluster",
            Self::ReplicationGroup => "AWS::ElastiCache::ReplicationGroup",
            Self::SearchDomain => "AWS::OpenSearchService::Domain",
        }
    }

    /// Get the category for this kind
    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::Vpc
            | Self::Subnet
            | Self::InternetGateway
            | Self::VpcGatewayAttachment
            | Self::RouteTable
            | Self::Route
            | Self::SubnetRouteTableAssociation
            | Self::Eip
            | Self::NatGateway
            | Self::FlowLog => ResourceCategory::Network,

            Self::SecurityGroup | Self::SecurityGroupIngress => ResourceCategory::Security,

            Self::IamRole | Self::InstanceProfile => ResourceCategory::Identity,

            Self::LogGroup | Self::LogResourcePolicy => ResourceCategory::Logging,

            Self::LaunchTemplate
            | Self::AutoScalingGroup
            | Self::LoadBalancer
            | Self::TargetGroup
            | Self::Listener => ResourceCategory::Compute,

            Self::EcsCluster
            | Self::CapacityProvider
            | Self::ClusterCapacityProviderAssociations
            | Self::TaskDefinition
            | Self::EcsService => ResourceCategory::Container,

            Self::DbSubnetGroup | Self::DbParameterGroup | Self::DbInstance => {
                ResourceCategory::Database
            }

            Self::Secret | Self::SecretTargetAttachment | Self::RotationSchedule => {
                ResourceCategory::Secrets
            }

            Self::CacheSubnetGroup | Self::CacheCluster | Self::ReplicationGroup => {
                ResourceCategory::Cache
            }

            Self::SearchDomain => ResourceCategory::Search,
        }
    }

    /// Attributes readable through `Fn::GetAtt`
    ///
    /// `Ref` is available on every kind and is not listed here.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Vpc => &["CidrBlock", "VpcId"],
            Self::Subnet => &["AvailabilityZone", "SubnetId"],
            Self::InternetGateway => &["InternetGatewayId"],
            Self::RouteTable => &["RouteTableId"],
            Self::Eip => &["AllocationId", "PublicIp"],
            Self::NatGateway => &["NatGatewayId"],
            Self::FlowLog => &["Id"],
            Self::SecurityGroup => &["GroupId", "VpcId"],
            Self::SecurityGroupIngress => &["Id"],
            Self::IamRole => &["Arn", "RoleId"],
            Self::InstanceProfile => &["Arn"],
            Self::LogGroup => &["Arn"],
            Self::LaunchTemplate => &["LatestVersionNumber", "LaunchTemplateId"],
            Self::LoadBalancer => &[
                "CanonicalHostedZoneID",
                "DNSName",
                "LoadBalancerArn",
                "LoadBalancerFullName",
            ],
            Self::TargetGroup => &["TargetGroupArn", "TargetGroupFullName"],
            Self::Listener => &["ListenerArn"],
            Self::EcsCluster => &["Arn"],
            Self::TaskDefinition => &["TaskDefinitionArn"],
            Self::EcsService => &["Name", "ServiceArn"],
            Self::DbInstance => &["DBInstanceArn", "Endpoint.Address", "Endpoint.Port"],
            Self::Secret => &["Id"],
            Self::CacheCluster => &["RedisEndpoint.Address", "RedisEndpoint.Port"],
            Self::ReplicationGroup => &[
                "ConfigurationEndPoint.Address",
                "ConfigurationEndPoint.Port",
                "PrimaryEndPoint.Address",
                "PrimaryEndPoint.Port",
            ],
            Self::SearchDomain => &["Arn", "DomainArn", "DomainEndpoint"],
            Self::VpcGatewayAttachment
            | Self::Route
            | Self::SubnetRouteTableAssociation
            | Self::LogResourcePolicy
            | Self::AutoScalingGroup
            | Self::CapacityProvider
            | Self::ClusterCapacityProviderAssociations
            | Self::DbSubnetGroup
            | Self::DbParameterGroup
            | Self::SecretTargetAttachment
            | Self::RotationSchedule
            | Self::CacheSubnetGroup => &[],
        }
    }

    /// Check whether `Fn::GetAtt` may read the named attribute
    pub fn exports(&self, attribute: &str) -> bool {
        self.attributes().contains(&attribute)
    }

    /// How this kind accepts tags
    pub fn tag_support(&self) -> TagSupport {
        match self {
            Self::AutoScalingGroup => TagSupport::PropagateAtLaunch,
            Self::VpcGatewayAttachment
            | Self::Route
            | Self::SubnetRouteTableAssociation
            | Self::SecurityGroupIngress
            | Self::InstanceProfile
            | Self::LogResourcePolicy
            | Self::LaunchTemplate
            | Self::Listener
            | Self::ClusterCapacityProviderAssociations
            | Self::SecretTargetAttachment
            | Self::RotationSchedule => TagSupport::None,
            _ => TagSupport::KeyValueList,
        }
    }

    /// Whether the kind holds data that outlives a redeploy
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            Self::DbInstance | Self::CacheCluster | Self::ReplicationGroup | Self::SearchDomain
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_names() {
        assert_eq!(ResourceKind::Vpc.as_str(), "AWS::EC2::VPC");
        assert_eq!(ResourceKind::DbInstance.as_str(), "AWS::RDS::DBInstance");
        assert_eq!(
            ResourceKind::SearchDomain.to_string(),
            "AWS::OpenSearchService::Domain"
        );
    }

    #[test]
    fn test_exports() {
        assert!(ResourceKind::DbInstance.exports("Endpoint.Address"));
        assert!(ResourceKind::CacheCluster.exports("RedisEndpoint.Port"));
        assert!(!ResourceKind::CacheCluster.exports("Endpoint.Address"));
        assert!(!ResourceKind::Route.exports("Id"));
    }

    #[test]
    fn test_tag_support() {
        assert_eq!(
            ResourceKind::AutoScalingGroup.tag_support(),
            TagSupport::PropagateAtLaunch
        );
        assert_eq!(ResourceKind::SecurityGroupIngress.tag_support(), TagSupport::None);
        assert_eq!(ResourceKind::DbInstance.tag_support(), TagSupport::KeyValueList);
    }

    #[test]
    fn test_categories() {
        assert_eq!(ResourceKind::NatGateway.category(), ResourceCategory::Network);
        assert_eq!(ResourceKind::RotationSchedule.category(), ResourceCategory::Secrets);
        assert!(ResourceKind::SearchDomain.is_stateful());
        assert!(!ResourceKind::LoadBalancer.is_stateful());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Environment Configuration Resolution
//!
//! Maps a stage selector plus the external inputs read once at startup into a
//! fully-populated [`EnvironmentDescriptor`]. Every builder reads the
//! descriptor; none of them hard-codes an environment-specific value.
//!
//! # Example
//!
//! ```rust
//! use cim_infrastructure_synth::config::{EnvironmentConfigResolver, ExternalInputs, Stage};
//! use cim_infrastructure_synth::domain::RemovalPolicy;
//!
//! let resolver = EnvironmentConfigResolver::new(ExternalInputs::default());
//! let prod = resolver.resolve(Stage::Prod).unwrap();
//! assert_eq!(prod.database.removal_policy, RemovalPolicy::Retain);
//!
//! // Ephemeral environments need a change id
//! assert!(resolver.resolve(Stage::FeatureDev).is_err());
//! ```

pub mod stage;
pub mod versions;

pub use stage::Stage;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constructs::cache::CacheTopology;
use crate::domain::{Ipv4Cidr, NamePrefix, RemovalPolicy, RetentionDays};
use crate::errors::{Component, SynthError, SynthResult};

/// Number of availability zones every network spans
pub const AVAILABILITY_ZONE_COUNT: usize = 2;

/// External inputs read once at resolution time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalInputs {
    /// Change identifier naming an ephemeral environment (`PR_NUMBER`)
    pub change_id: Option<String>,
    /// Account override (`ACCOUNT`, falling back to `CDK_DEFAULT_ACCOUNT`)
    pub account: Option<String>,
    /// Region override (`REGION`, falling back to `CDK_DEFAULT_REGION`)
    pub region: Option<String>,
    /// Address space override (`NETWORK_CIDR`)
    pub network_cidr: Option<String>,
    /// Database removal policy override (`DB_REMOVAL_POLICY`)
    pub database_removal_policy: Option<String>,
}

impl ExternalInputs {
    /// Load inputs from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load inputs through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            change_id: non_empty("PR_NUMBER"),
            account: non_empty("ACCOUNT").or_else(|| non_empty("CDK_DEFAULT_ACCOUNT")),
            region: non_empty("REGION").or_else(|| non_empty("CDK_DEFAULT_REGION")),
            network_cidr: non_empty("NETWORK_CIDR"),
            database_removal_policy: non_empty("DB_REMOVAL_POLICY"),
        }
    }

    /// Set the change id
    pub fn with_change_id(mut self, change_id: impl Into<String>) -> Self {
        self.change_id = Some(change_id.into());
        self
    }

    /// Set the account and region
    pub fn with_target(mut self, account: impl Into<String>, region: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self.region = Some(region.into());
        self
    }
}

/// Account and region a stack deploys into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub account: String,
    pub region: String,
}

/// Compute fleet parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeSettings {
    pub instance_class: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

/// Cache parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub node_class: String,
    pub engine_version: String,
    pub cluster_name: String,
    pub topology: CacheTopology,
}

/// Relational database parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub name: String,
    pub instance_id: String,
    pub instance_class: String,
    pub engine_version: String,
    pub username: String,
    pub removal_policy: RemovalPolicy,
    pub allocated_storage_gib: u32,
    pub backup_window: Option<String>,
    pub maintenance_window: Option<String>,
    pub extra_ingress: Vec<Ipv4Cidr>,
}

/// Search domain parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub instance_class: String,
    pub engine_version: String,
    pub domain_name: String,
    pub volume_size_gib: u32,
}

/// Load balancer health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSettings {
    pub path: String,
    pub interval_secs: u32,
    pub timeout_secs: u32,
}

/// Application container parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSettings {
    pub image: String,
    pub memory_limit_mib: u32,
    pub application_port: u16,
    pub listener_port: u16,
    pub desired_count: u32,
    pub health_check: HealthCheckSettings,
}

/// Fully-resolved environment
///
/// One instance per synthesis run, borrowed read-only by every builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    pub stage: Stage,
    pub stage_name: String,
    pub prefix: NamePrefix,
    pub target: DeploymentTarget,
    pub availability_zones: Vec<String>,
    pub network_cidr: Ipv4Cidr,
    pub log_retention: RetentionDays,
    pub compute: ComputeSettings,
    pub cache: CacheSettings,
    pub database: DatabaseSettings,
    pub search: SearchSettings,
    pub container: ContainerSettings,
}

impl EnvironmentDescriptor {
    /// Copy with a different address space
    pub fn with_network_cidr(mut self, cidr: Ipv4Cidr) -> Self {
        self.network_cidr = cidr;
        self
    }

    /// Copy with a different database removal policy
    pub fn with_database_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.database.removal_policy = policy;
        self
    }

    /// Copy with a different cache topology
    pub fn with_cache_topology(mut self, topology: CacheTopology) -> Self {
        self.cache.topology = topology;
        self
    }

    /// Stack name for this environment
    pub fn stack_name(&self) -> String {
        self.prefix.qualify("AwsProductSetupStack")
    }
}

/// Resolves stage selectors into environment descriptors
#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfigResolver {
    inputs: ExternalInputs,
}

impl EnvironmentConfigResolver {
    /// Create a resolver over the given external inputs
    pub fn new(inputs: ExternalInputs) -> Self {
        Self { inputs }
    }

    /// Create a resolver reading external inputs from the process environment
    pub fn from_env() -> Self {
        Self::new(ExternalInputs::from_env())
    }

    /// External inputs this resolver applies
    pub fn inputs(&self) -> &ExternalInputs {
        &self.inputs
    }

    /// Resolve a free-form stage key
    pub fn resolve_key(&self, key: &str) -> SynthResult<EnvironmentDescriptor> {
        let stage = key
            .parse::<Stage>()
            .map_err(|e| SynthError::configuration(Component::EnvironmentConfig, e))?;
        self.resolve(stage)
    }

    /// Resolve a stage into a descriptor
    ///
    /// # Errors
    /// - `Configuration` when an ephemeral stage is missing its change id,
    ///   account or region, when the change id names another stage, or when
    ///   an override does not parse
    pub fn resolve(&self, stage: Stage) -> SynthResult<EnvironmentDescriptor> {
        let profile = stage.profile();

        let stage_name = if stage.is_ephemeral() {
            let change_id = self.inputs.change_id.as_deref().ok_or_else(|| {
                SynthError::configuration(
                    Component::EnvironmentConfig,
                    "PR_NUMBER is required to name a featureDev environment",
                )
            })?;
            let name = change_id.trim().to_lowercase();
            if let Ok(named) = name.parse::<Stage>() {
                if !named.is_ephemeral() {
                    return Err(SynthError::configuration(
                        Component::EnvironmentConfig,
                        format!(
                            "change id {:?} would reuse the physical names of the {} stage",
                            change_id, named
                        ),
                    ));
                }
            }
            name
        } else {
            stage.as_str().to_string()
        };

        let prefix = NamePrefix::new(stage_name.clone()).map_err(|e| {
            SynthError::configuration(
                Component::EnvironmentConfig,
                format!("{:?} is not a usable stage name: {}", stage_name, e),
            )
        })?;

        let target = match profile.target {
            Some((account, region)) => DeploymentTarget {
                account: account.to_string(),
                region: region.to_string(),
            },
            None => DeploymentTarget {
                account: self.required(self.inputs.account.as_deref(), "ACCOUNT or CDK_DEFAULT_ACCOUNT")?,
                region: self.required(self.inputs.region.as_deref(), "REGION or CDK_DEFAULT_REGION")?,
            },
        };

        let cidr_source = self.inputs.network_cidr.as_deref().unwrap_or(profile.cidr);
        let network_cidr = Ipv4Cidr::new(cidr_source).map_err(|e| {
            SynthError::configuration(
                Component::EnvironmentConfig,
                format!("network CIDR {:?}: {}", cidr_source, e),
            )
        })?;

        let removal_policy = match self.inputs.database_removal_policy.as_deref() {
            Some(raw) => raw
                .parse::<RemovalPolicy>()
                .map_err(|e| SynthError::configuration(Component::EnvironmentConfig, e))?,
            None => stage.default_removal_policy(),
        };

        let availability_zones = ["a", "b"]
            .iter()
            .take(AVAILABILITY_ZONE_COUNT)
            .map(|suffix| format!("{}{}", target.region, suffix))
            .collect();

        debug!(
            stage = stage.as_str(),
            cidr = %network_cidr,
            removal = removal_policy.as_str(),
            "applied stage profile"
        );

        let descriptor = EnvironmentDescriptor {
            stage,
            stage_name: stage_name.clone(),
            target,
            availability_zones,
            network_cidr,
            log_retention: RetentionDays::ONE_DAY,
            compute: ComputeSettings {
                instance_class: "t2.micro".to_string(),
                min_capacity: 1,
                max_capacity: 1,
            },
            cache: CacheSettings {
                node_class: "cache.t2.micro".to_string(),
                engine_version: versions::CACHE_ENGINE_VERSION.to_string(),
                cluster_name: prefix.qualify("redis"),
                topology: CacheTopology::SingleNode,
            },
            database: DatabaseSettings {
                name: prefix.underscored("db"),
                instance_id: prefix.qualify("db-instance"),
                instance_class: profile.database_instance_class.to_string(),
                engine_version: versions::DATABASE_ENGINE_VERSION.to_string(),
                username: "dbadmin".to_string(),
                removal_policy,
                allocated_storage_gib: 20,
                backup_window: None,
                maintenance_window: None,
                extra_ingress: Vec::new(),
            },
            search: SearchSettings {
                instance_class: "t3.small.search".to_string(),
                engine_version: versions::SEARCH_ENGINE_VERSION.to_string(),
                domain_name: prefix.qualify("search"),
                volume_size_gib: 10,
            },
            container: ContainerSettings {
                image: versions::APPLICATION_IMAGE.to_string(),
                memory_limit_mib: 256,
                application_port: 80,
                listener_port: 80,
                desired_count: 1,
                health_check: HealthCheckSettings {
                    path: "/".to_string(),
                    interval_secs: 60,
                    timeout_secs: 5,
                },
            },
            prefix,
        };

        info!(
            stage = %descriptor.stage,
            stage_name = %descriptor.stage_name,
            account = %descriptor.target.account,
            region = %descriptor.target.region,
            "resolved environment"
        );

        Ok(descriptor)
    }

    fn required(&self, value: Option<&str>, name: &str) -> SynthResult<String> {
        value.map(str::to_string).ok_or_else(|| {
            SynthError::configuration(
                Component::EnvironmentConfig,
                format!("{} is required for a featureDev environment", name),
            )
        })
    }
}

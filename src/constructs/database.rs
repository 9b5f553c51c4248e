// Copyright (c) 2025 - Cowboy AI, Inc.
//! Relational database builder
//!
//! MariaDB instance in the private tier, credentials in a generated secret
//! with single-user rotation, and a dedicated security identity on the
//! database port.

use serde_json::{json, Value};
use tracing::{info, warn};

use super::network::{subnet_ids, subnet_refs, NetworkTopology};
use super::security::{declare_security_group, FleetIdentity, IngressSource, ServiceIdentity};
use crate::config::EnvironmentDescriptor;
use crate::domain::{
    LogicalId, Peer, Placement, PortRange, RemovalPolicy, ResourceKind, SubnetTier,
    ValidationError,
};
use crate::errors::{Component, SynthError, SynthResult};
use crate::provisioning::{ResourceDeclaration, ResourceHandle, StackGraph, StackOutput};

const SCOPE: &str = "Database";
const COMPONENT: Component = Component::Database;

/// MySQL protocol port
pub const MYSQL_PORT: u16 = 3306;

/// Generated password length
pub const PASSWORD_LENGTH: u32 = 30;

/// Characters the generated password never contains
pub const EXCLUDED_PASSWORD_CHARACTERS: &str = "\"@/\\ '";

/// Automated backup retention
pub const BACKUP_RETENTION_DAYS: u32 = 7;

/// Enhanced monitoring interval
pub const MONITORING_INTERVAL_SECS: u32 = 60;

/// Credential rotation interval
pub const ROTATION_INTERVAL_DAYS: u32 = 30;

/// Log types exported from the instance
pub const LOG_EXPORTS: [&str; 4] = ["audit", "error", "general", "slowquery"];

/// Inputs of the database builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseProps {
    pub name: String,
    pub instance_id: String,
    pub instance_class: String,
    pub engine_version: String,
    pub username: String,
    pub removal_policy: RemovalPolicy,
    pub allocated_storage_gib: u32,
    pub backup_window: Option<String>,
    pub maintenance_window: Option<String>,
    pub extra_sources: Vec<Peer>,
}

impl DatabaseProps {
    /// Props taken from the environment's database settings
    pub fn from_descriptor(env: &EnvironmentDescriptor) -> Self {
        let settings = &env.database;
        Self {
            name: settings.name.clone(),
            instance_id: settings.instance_id.clone(),
            instance_class: settings.instance_class.clone(),
            engine_version: settings.engine_version.clone(),
            username: settings.username.clone(),
            removal_policy: settings.removal_policy,
            allocated_storage_gib: settings.allocated_storage_gib,
            backup_window: settings.backup_window.clone(),
            maintenance_window: settings.maintenance_window.clone(),
            extra_sources: settings.extra_ingress.iter().map(|cidr| cidr.peer()).collect(),
        }
    }

    /// Admit one more source on the database port
    pub fn with_extra_source(mut self, source: &dyn IngressSource) -> Self {
        self.extra_sources.push(source.peer());
        self
    }

    /// Parameter group family for the engine version (`10.6.8` → `mariadb10.6`)
    pub fn engine_family(&self) -> String {
        let major_minor: Vec<&str> = self.engine_version.split('.').take(2).collect();
        format!("mariadb{}", major_minor.join("."))
    }
}

/// Output of the database builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub instance: ResourceHandle,
    pub secret: ResourceHandle,
    pub identity: ServiceIdentity,
    pub endpoint: Value,
}

/// Builds the relational database for one environment
pub struct RelationalDatabaseBuilder<'a> {
    env: &'a EnvironmentDescriptor,
    props: DatabaseProps,
}

impl<'a> RelationalDatabaseBuilder<'a> {
    pub fn new(env: &'a EnvironmentDescriptor) -> Self {
        Self {
            env,
            props: DatabaseProps::from_descriptor(env),
        }
    }

    /// Replace the props taken from the descriptor
    pub fn with_props(mut self, props: DatabaseProps) -> Self {
        self.props = props;
        self
    }

    pub fn props(&self) -> &DatabaseProps {
        &self.props
    }

    /// Declare the database
    ///
    /// # Errors
    /// - `Validation` when the network has no private subnets or an extra
    ///   source is open to every address; nothing is declared in either case
    pub fn build(
        &self,
        graph: &mut StackGraph,
        network: &NetworkTopology,
        fleet: &FleetIdentity,
    ) -> SynthResult<Database> {
        let env = self.env;
        let props = &self.props;
        let private = network
            .private_subnets()
            .map_err(|e| SynthError::validation(COMPONENT, e))?;

        if let Some(open) = props.extra_sources.iter().find(|peer| peer.is_any()) {
            warn!(component = %COMPONENT, source = %open, "rejected open database ingress");
            return Err(SynthError::validation(
                COMPONENT,
                ValidationError::OpenIngress {
                    target: LogicalId::scoped(SCOPE, "SecurityGroup").to_string(),
                    ports: PortRange::tcp(MYSQL_PORT).to_string(),
                },
            ));
        }

        let group_name = env.prefix.qualify("sg-db");
        let mut identity = ServiceIdentity::new(declare_security_group(
            graph,
            COMPONENT,
            LogicalId::scoped(SCOPE, "SecurityGroup"),
            &group_name,
            "Database security group",
            network.vpc(),
        )?);
        identity.allow_from(
            graph,
            COMPONENT,
            fleet,
            PortRange::tcp(MYSQL_PORT),
            "Allow from the fleet",
        )?;
        for source in &props.extra_sources {
            identity.allow_from(
                graph,
                COMPONENT,
                source,
                PortRange::tcp(MYSQL_PORT),
                &format!("MySQL from {}", source),
            )?;
        }

        let subnet_group_name = env.prefix.qualify("db-subnet-group");
        let subnet_group = graph.declare_named(
            declaration(
                ResourceKind::DbSubnetGroup,
                "SubnetGroup",
                json!({
                    "DBSubnetGroupName": subnet_group_name,
                    "DBSubnetGroupDescription": format!("Database subnet group for {}", env.stage_name),
                    "SubnetIds": subnet_refs(private),
                }),
            ),
            subnet_group_name.clone(),
        )?;

        let secret_name = format!("{}MysqlCredentials", props.name);
        let secret = graph.declare_named(
            declaration(
                ResourceKind::Secret,
                "Credentials",
                json!({
                    "Name": secret_name,
                    "Description": format!("{} MySQL database credentials", props.name),
                    "GenerateSecretString": {
                        "ExcludeCharacters": EXCLUDED_PASSWORD_CHARACTERS,
                        "GenerateStringKey": "password",
                        "PasswordLength": PASSWORD_LENGTH,
                        "SecretStringTemplate": json!({ "username": props.username }).to_string(),
                    },
                }),
            )
            .with_removal_policy(props.removal_policy),
            secret_name.clone(),
        )?;

        let parameter_group = graph.declare(declaration(
            ResourceKind::DbParameterGroup,
            "ParameterGroup",
            json!({
                "Family": props.engine_family(),
                "Description": format!("Parameter group for {}", props.engine_family()),
                "Parameters": {},
            }),
        ))?;

        let monitoring_role = graph.declare(declaration(
            ResourceKind::IamRole,
            "MonitoringRole",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "monitoring.rds.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "ManagedPolicyArns": [
                    "arn:aws:iam::aws:policy/service-role/AmazonRDSEnhancedMonitoringRole",
                ],
            }),
        ))?;

        let mut properties = json!({
            "DBName": props.name,
            "DBInstanceIdentifier": props.instance_id,
            "DBInstanceClass": format!("db.{}", props.instance_class),
            "Engine": "mariadb",
            "EngineVersion": props.engine_version,
            "MasterUsername": resolve_secret_field(&secret, "username"),
            "MasterUserPassword": resolve_secret_field(&secret, "password"),
            "AllocatedStorage": props.allocated_storage_gib.to_string(),
            "StorageType": "gp2",
            "StorageEncrypted": false,
            "BackupRetentionPeriod": BACKUP_RETENTION_DAYS,
            "AllowMajorVersionUpgrade": true,
            "AutoMinorVersionUpgrade": true,
            "CopyTagsToSnapshot": true,
            "EnablePerformanceInsights": false,
            "EnableCloudwatchLogsExports": LOG_EXPORTS,
            "MonitoringInterval": MONITORING_INTERVAL_SECS,
            "MonitoringRoleArn": monitoring_role.attribute("Arn")?,
            "DBParameterGroupName": parameter_group.reference(),
            "DBSubnetGroupName": subnet_group.reference(),
            "VPCSecurityGroups": [identity.group_id()],
            "PubliclyAccessible": false,
        });
        if let Some(window) = &props.backup_window {
            properties["PreferredBackupWindow"] = json!(window);
        }
        if let Some(window) = &props.maintenance_window {
            properties["PreferredMaintenanceWindow"] = json!(window);
        }

        let instance = graph.declare_named(
            declaration(ResourceKind::DbInstance, "Instance", properties)
                .with_removal_policy(props.removal_policy),
            props.instance_id.clone(),
        )?;
        graph.record_placement(Placement {
            resource: instance.id().clone(),
            required: SubnetTier::Private,
            subnets: subnet_ids(private),
        });

        let attachment = graph.declare(declaration(
            ResourceKind::SecretTargetAttachment,
            "SecretAttachment",
            json!({
                "SecretId": secret.reference(),
                "TargetId": instance.reference(),
                "TargetType": "AWS::RDS::DBInstance",
            }),
        ))?;

        graph.declare(
            declaration(
                ResourceKind::RotationSchedule,
                "RotationSchedule",
                json!({
                    "SecretId": attachment.reference(),
                    "HostedRotationLambda": {
                        "RotationType": "MySQLSingleUser",
                        "RotationLambdaName": env.prefix.qualify("db-rotation"),
                        "VpcSecurityGroupIds": fleet.group_id(),
                        "VpcSubnetIds": {
                            "Fn::Join": [",", subnet_refs(private)],
                        },
                    },
                    "RotationRules": {
                        "AutomaticallyAfterDays": ROTATION_INTERVAL_DAYS,
                    },
                }),
            )
            .depends_on(&instance),
        )?;

        let endpoint = instance.attribute("Endpoint.Address")?;
        graph.add_output(
            COMPONENT,
            StackOutput::new("MysqlEndpoint", endpoint.clone())
                .exported_as(env.prefix.qualify("MysqlEndpoint")),
        )?;
        graph.add_output(
            COMPONENT,
            StackOutput::new("MysqlCredentials", secret.reference())
                .exported_as(env.prefix.qualify("MysqlCredentials"))
                .described("Secret holding the database credentials"),
        )?;
        graph.add_output(
            COMPONENT,
            StackOutput::new("MysqlUserName", json!(props.username))
                .exported_as(env.prefix.qualify("MysqlUserName")),
        )?;
        graph.add_output(
            COMPONENT,
            StackOutput::new("MysqlDbName", json!(props.name))
                .exported_as(env.prefix.qualify("MysqlDbName")),
        )?;

        info!(
            component = %COMPONENT,
            stage = %env.stage_name,
            instance = %props.instance_id,
            class = %props.instance_class,
            removal = props.removal_policy.as_str(),
            extra_sources = props.extra_sources.len(),
            "declared database"
        );

        Ok(Database {
            instance,
            secret,
            identity,
            endpoint,
        })
    }
}

fn declaration(kind: ResourceKind, name: &str, properties: Value) -> ResourceDeclaration {
    ResourceDeclaration::new(COMPONENT, kind, LogicalId::scoped(SCOPE, name), properties)
}

/// `{{resolve:secretsmanager:<secret>:SecretString:<field>}}` dynamic reference
fn resolve_secret_field(secret: &ResourceHandle, field: &str) -> Value {
    json!({
        "Fn::Join": ["", [
            "{{resolve:secretsmanager:",
            secret.reference(),
            format!(":SecretString:{}}}}}", field),
        ]],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvironmentConfigResolver, Stage};
    use crate::constructs::compute::ComputeClusterBuilder;
    use crate::constructs::network::{NetworkTopologyBuilder, Subnet};
    use crate::domain::Ipv4Cidr;

    struct Fixture {
        env: EnvironmentDescriptor,
        graph: StackGraph,
        network: NetworkTopology,
        fleet: FleetIdentity,
    }

    fn fixture(stage: Stage) -> Fixture {
        let env = EnvironmentConfigResolver::default().resolve(stage).unwrap();
        let mut graph = StackGraph::new();
        let network = NetworkTopologyBuilder::new(&env).build(&mut graph).unwrap();
        let compute = ComputeClusterBuilder::new(&env).build(&mut graph, &network).unwrap();
        Fixture {
            env,
            graph,
            network,
            fleet: compute.fleet_identity,
        }
    }

    fn instance<'g>(graph: &'g StackGraph, db: &Database) -> &'g ResourceDeclaration {
        graph.resources().iter().find(|r| r.id == *db.instance.id()).unwrap()
    }

    #[test]
    fn test_instance_properties() {
        let mut f = fixture(Stage::Dev);
        let db = RelationalDatabaseBuilder::new(&f.env)
            .build(&mut f.graph, &f.network, &f.fleet)
            .unwrap();

        let props = &instance(&f.graph, &db).properties;
        assert_eq!(props["DBName"], "dev_db");
        assert_eq!(props["DBInstanceIdentifier"], "dev-db-instance");
        assert_eq!(props["DBInstanceClass"], "db.t2.micro");
        assert_eq!(props["EngineVersion"], "10.6.8");
        assert_eq!(props["BackupRetentionPeriod"], 7);
        assert_eq!(props["MonitoringInterval"], 60);
        assert_eq!(props["PubliclyAccessible"], false);
        assert_eq!(
            props["EnableCloudwatchLogsExports"],
            json!(["audit", "error", "general", "slowquery"])
        );
        assert!(props.get("PreferredBackupWindow").is_none());
    }

    #[test]
    fn test_removal_policy_threaded() {
        let mut f = fixture(Stage::Prod);
        let db = RelationalDatabaseBuilder::new(&f.env)
            .build(&mut f.graph, &f.network, &f.fleet)
            .unwrap();
        assert_eq!(
            instance(&f.graph, &db).removal_policy,
            Some(RemovalPolicy::Retain)
        );
    }

    #[test]
    fn test_secret_generation() {
        let mut f = fixture(Stage::Dev);
        let db = RelationalDatabaseBuilder::new(&f.env)
            .build(&mut f.graph, &f.network, &f.fleet)
            .unwrap();
        let secret = f.graph.resources().iter().find(|r| r.id == *db.secret.id()).unwrap();
        let generate = &secret.properties["GenerateSecretString"];
        assert_eq!(generate["PasswordLength"], 30);
        assert_eq!(generate["GenerateStringKey"], "password");
        assert_eq!(generate["ExcludeCharacters"], "\"@/\\ '");
        assert_eq!(generate["SecretStringTemplate"], r#"{"username":"dbadmin"}"#);

        let rotation = f
            .graph
            .resources()
            .iter()
            .find(|r| r.kind == ResourceKind::RotationSchedule)
            .unwrap();
        assert_eq!(
            rotation.properties["HostedRotationLambda"]["RotationType"],
            "MySQLSingleUser"
        );
        assert_eq!(rotation.properties["RotationRules"]["AutomaticallyAfterDays"], 30);
    }

    #[test]
    fn test_extra_sources_are_separate_rules() {
        let mut f = fixture(Stage::Dev);
        let office = Ipv4Cidr::new("192.168.10.0/24").unwrap();
        let vpn = Ipv4Cidr::new("172.16.0.0/16").unwrap();
        let builder = RelationalDatabaseBuilder::new(&f.env);
        let props = builder.props().clone().with_extra_source(&office).with_extra_source(&vpn);
        let db = builder
            .with_props(props)
            .build(&mut f.graph, &f.network, &f.fleet)
            .unwrap();

        let rules = db.identity.identity().rules();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].source, f.fleet.peer());
        assert!(db.identity.identity().allows(&office.peer(), MYSQL_PORT));
        assert!(rules.iter().all(|r| r.ports == PortRange::tcp(MYSQL_PORT)));
    }

    #[test]
    fn test_open_extra_source_rejected() {
        let mut f = fixture(Stage::Dev);
        let before = f.graph.len();
        let builder = RelationalDatabaseBuilder::new(&f.env);
        let props = builder.props().clone().with_extra_source(&Ipv4Cidr::any_ipv4());
        let err = builder
            .with_props(props)
            .build(&mut f.graph, &f.network, &f.fleet)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(f.graph.len(), before);
    }

    #[test]
    fn test_no_private_subnets() {
        let mut f = fixture(Stage::Dev);
        let public: Vec<Subnet> = f.network.public_subnets().unwrap().to_vec();
        let stripped = NetworkTopology::from_parts(
            f.network.vpc().clone(),
            f.network.cidr(),
            public,
            Vec::new(),
            f.network.flow_log_sink().clone(),
        );
        let before = f.graph.len();
        let err = RelationalDatabaseBuilder::new(&f.env)
            .build(&mut f.graph, &stripped, &f.fleet)
            .unwrap_err();
        assert!(matches!(
            err,
            SynthError::Validation {
                source: ValidationError::NoPrivateSubnets,
                ..
            }
        ));
        assert_eq!(f.graph.len(), before);
    }

    #[test]
    fn test_engine_family() {
        let f = fixture(Stage::Dev);
        assert_eq!(DatabaseProps::from_descriptor(&f.env).engine_family(), "mariadb10.6");
    }
}

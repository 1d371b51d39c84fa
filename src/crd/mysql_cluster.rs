use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// MysqlCluster is the Schema for the mysqlclusters API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    group = "mysql.presslabs.org",
    version = "v1alpha1",
    kind = "MysqlCluster",
    plural = "mysqlclusters",
    shortname = "mysql",
    namespaced,
    status = "MysqlClusterStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.mysqlVersion"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Ready", "type":"integer", "jsonPath":".status.readyNodes"}"#,
    printcolumn = r#"{"name":"Master", "type":"string", "jsonPath":".status.masterHost"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MysqlClusterSpec {
    /// Number of MySQL members (one master, the rest replicas)
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Secret holding the cluster credentials (defaults to the derived resource name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// MySQL version, used as the image tag (e.g., "5.7")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql_version: Option<String>,

    /// Extra `my.cnf` settings, keyed by option name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mysql_conf: BTreeMap<String, String>,

    /// Pod level settings for MySQL members
    #[serde(default)]
    pub pod_spec: PodSpec,

    /// Persistent volume settings for MySQL data
    #[serde(default)]
    pub volume_spec: VolumeSpec,

    /// Backup schedule in cron format; no backup CronJob is managed when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<String>,

    /// Bucket URI backups are uploaded to (e.g., "gs://bucket/prefix")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_uri: Option<String>,

    /// Secret with credentials for the backup bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_secret_name: Option<String>,

    /// Orchestrator API address (e.g., "http://orchestrator:3000/api")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_uri: Option<String>,
}

fn default_replicas() -> i32 {
    1
}

/// Pod level settings
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Image pull policy for MySQL containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// CPU and memory requirements
    #[serde(default)]
    pub resources: ResourceRequirements,

    /// Soft anti-affinity used to spread members across hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anti_affinity: Option<AntiAffinitySpec>,
}

/// Resource requirements for MySQL pods
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// CPU and memory limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceList>,

    /// CPU and memory requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceList>,
}

/// Resource quantities for CPU and memory
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ResourceList {
    /// CPU quantity (e.g., "500m", "2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity (e.g., "512Mi", "2Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ResourceList {
    fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }
}

impl ResourceRequirements {
    /// True when no request quantity is set
    pub fn requests_unset(&self) -> bool {
        self.requests.as_ref().is_none_or(ResourceList::is_empty)
    }

    /// Requested memory quantity, if any
    pub fn memory_request(&self) -> Option<&str> {
        self.requests.as_ref().and_then(|r| r.memory.as_deref())
    }
}

/// Preferred pod anti-affinity term
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AntiAffinitySpec {
    /// Scheduling weight (1-100)
    pub weight: i32,

    /// Node label that identifies a failure domain
    pub topology_key: String,

    /// Labels of the pods to stay away from
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

/// Persistent volume settings
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    /// Access modes for the data volume (e.g., "ReadWriteOnce")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_modes: Vec<String>,

    /// Storage class name (uses default if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Requested storage size (e.g., "10Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Status of the MysqlCluster
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MysqlClusterStatus {
    /// Number of members currently ready
    #[serde(default)]
    pub ready_nodes: i32,

    /// Host of the current master
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_host: Option<String>,

    /// Host of a replica that is safe to read from (used for backups)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy_slave_host: Option<String>,

    /// Observed generation of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Kubernetes-style conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Kubernetes-style condition
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition: True, False, or Unknown
    pub status: String,

    /// Reason for the condition's last transition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: String,

    /// Generation observed when condition was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Kind of a resource managed for a cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceName {
    Secret,
    ConfigArtifact,
    NetworkEndpoint,
    Workload,
    BackupSchedule,
}

impl ResourceName {
    /// All resource kinds, in reconciliation order
    pub const ORDERED: [ResourceName; 5] = [
        ResourceName::Secret,
        ResourceName::ConfigArtifact,
        ResourceName::NetworkEndpoint,
        ResourceName::Workload,
        ResourceName::BackupSchedule,
    ];

    /// Short name used in logs and metrics
    pub fn alias(self) -> &'static str {
        match self {
            ResourceName::Secret => "cluster-secret",
            ResourceName::ConfigArtifact => "config-map",
            ResourceName::NetworkEndpoint => "headless-service",
            ResourceName::Workload => "statefulset",
            ResourceName::BackupSchedule => "backup-cron-job",
        }
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.alias())
    }
}

/// Derive the name of a managed resource for a cluster.
///
/// Every kind maps to `<cluster>-mysql`. Kubernetes scopes names per kind, so
/// the Secret, ConfigMap, Service, StatefulSet and CronJob never clash.
pub fn name_for_resource(_kind: ResourceName, cluster_name: &str) -> String {
    format!("{}-mysql", cluster_name)
}

impl MysqlCluster {
    /// Name of a managed resource of the given kind
    pub fn name_for_resource(&self, kind: ResourceName) -> String {
        name_for_resource(kind, &self.name_any())
    }

    /// Credentials secret name, falling back to the derived name
    pub fn secret_name(&self) -> String {
        self.spec
            .secret_name
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.name_for_resource(ResourceName::Secret))
    }

    /// Stable DNS name of the member with the given ordinal
    pub fn member_host(&self, ordinal: i32) -> String {
        format!(
            "{}-{}.{}.{}",
            self.name_for_resource(ResourceName::Workload),
            ordinal,
            self.name_for_resource(ResourceName::NetworkEndpoint),
            self.namespace().unwrap_or_else(|| "default".to_string())
        )
    }

    /// Cluster alias as registered in orchestrator
    pub fn orchestrator_cluster_alias(&self) -> String {
        format!(
            "{}.{}",
            self.name_any(),
            self.namespace().unwrap_or_else(|| "default".to_string())
        )
    }

    /// Configured orchestrator address; empty strings count as unset
    pub fn orchestrator_uri(&self) -> Option<&str> {
        self.spec
            .orchestrator_uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
    }

    /// Number of members reported ready in status
    pub fn ready_nodes(&self) -> i32 {
        self.status.as_ref().map(|s| s.ready_nodes).unwrap_or(0)
    }

    /// Labels selecting the members of this cluster
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app".to_string(), "mysql-operator".to_string()),
            ("mysql_cluster".to_string(), self.name_any()),
        ])
    }
}

//! Test fixtures and builders for MysqlCluster resources
//!
//! # Quick Start
//!
//! ```rust,ignore
//! let cluster = create_test_cluster("foo", "db", 3);
//!
//! let cluster = MysqlClusterBuilder::new("foo", "db")
//!     .with_replicas(3)
//!     .with_memory_request("2Gi")
//!     .with_orchestrator("http://orc:3000/api")
//!     .with_ready_nodes(3)
//!     .build();
//! ```

use kube::core::ObjectMeta;
use mysql_operator::crd::{MysqlCluster, MysqlClusterSpec, MysqlClusterStatus, ResourceList};

/// Create a cluster with default spec and no status
pub fn create_test_cluster(name: &str, namespace: &str, replicas: i32) -> MysqlCluster {
    MysqlClusterBuilder::new(name, namespace)
        .with_replicas(replicas)
        .build()
}

/// Builder for MysqlCluster test resources
pub struct MysqlClusterBuilder {
    metadata: ObjectMeta,
    spec: MysqlClusterSpec,
    status: Option<MysqlClusterStatus>,
}

impl MysqlClusterBuilder {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                uid: Some("test-uid-12345".to_string()),
                generation: Some(1),
                ..Default::default()
            },
            spec: serde_json::from_str("{}").expect("empty spec deserializes"),
            status: None,
        }
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.metadata.generation = Some(generation);
        self
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.spec.replicas = replicas;
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.spec.mysql_version = Some(version.to_string());
        self
    }

    pub fn with_secret_name(mut self, name: &str) -> Self {
        self.spec.secret_name = Some(name.to_string());
        self
    }

    pub fn with_conf(mut self, key: &str, value: &str) -> Self {
        self.spec
            .mysql_conf
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_memory_request(mut self, memory: &str) -> Self {
        let requests = self
            .spec
            .pod_spec
            .resources
            .requests
            .get_or_insert_with(ResourceList::default);
        requests.memory = Some(memory.to_string());
        self
    }

    pub fn with_cpu_request(mut self, cpu: &str) -> Self {
        let requests = self
            .spec
            .pod_spec
            .resources
            .requests
            .get_or_insert_with(ResourceList::default);
        requests.cpu = Some(cpu.to_string());
        self
    }

    pub fn with_orchestrator(mut self, uri: &str) -> Self {
        self.spec.orchestrator_uri = Some(uri.to_string());
        self
    }

    pub fn with_backup(mut self, schedule: &str, uri: &str) -> Self {
        self.spec.backup_schedule = Some(schedule.to_string());
        self.spec.backup_uri = Some(uri.to_string());
        self
    }

    pub fn with_storage(mut self, size: &str, class: Option<&str>) -> Self {
        self.spec.volume_spec.size = Some(size.to_string());
        self.spec.volume_spec.storage_class = class.map(str::to_string);
        self
    }

    pub fn with_ready_nodes(mut self, ready: i32) -> Self {
        self.status
            .get_or_insert_with(MysqlClusterStatus::default)
            .ready_nodes = ready;
        self
    }

    pub fn with_healthy_slave_host(mut self, host: &str) -> Self {
        self.status
            .get_or_insert_with(MysqlClusterStatus::default)
            .healthy_slave_host = Some(host.to_string());
        self
    }

    pub fn build(self) -> MysqlCluster {
        MysqlCluster {
            metadata: self.metadata,
            spec: self.spec,
            status: self.status,
        }
    }
}

//! `my.cnf` ConfigMap generation
//!
//! The rendered file starts from a fixed set of replication friendly settings;
//! `spec.mysqlConf` entries override them key by key.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use sha2::{Digest, Sha256};

use crate::crd::{MysqlCluster, ResourceName};
use crate::resources::common::owned_metadata;

/// Key of the rendered configuration inside the ConfigMap
pub const MY_CNF_KEY: &str = "my.cnf";

/// Settings every member needs for GTID based replication
const BASE_SETTINGS: [(&str, &str); 10] = [
    ("default-storage-engine", "InnoDB"),
    ("enforce-gtid-consistency", "ON"),
    ("gtid-mode", "ON"),
    ("innodb-flush-method", "O_DIRECT"),
    ("log-bin", "/var/lib/mysql/mysql-bin"),
    ("log-slave-updates", "on"),
    ("relay-log", "/var/lib/mysql/mysql-relay-bin"),
    ("skip-host-cache", "on"),
    ("skip-name-resolve", "on"),
    ("skip-slave-start", "on"),
];

/// Render `my.cnf` for a cluster
pub fn render_my_cnf(cluster: &MysqlCluster) -> String {
    let mut settings: BTreeMap<&str, &str> = BASE_SETTINGS.into_iter().collect();
    for (key, value) in &cluster.spec.mysql_conf {
        settings.insert(key.as_str(), value.as_str());
    }

    let mut out = String::from("[mysqld]\n");
    for (key, value) in settings {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Hex SHA-256 of the rendered `my.cnf`
pub fn config_hash(cluster: &MysqlCluster) -> String {
    format!("{:x}", Sha256::digest(render_my_cnf(cluster).as_bytes()))
}

/// Generate the ConfigMap holding `my.cnf`
pub fn generate_config_map(cluster: &MysqlCluster) -> ConfigMap {
    let name = cluster.name_for_resource(ResourceName::ConfigArtifact);

    ConfigMap {
        metadata: owned_metadata(cluster, name),
        data: Some(BTreeMap::from([(
            MY_CNF_KEY.to_string(),
            render_my_cnf(cluster),
        )])),
        ..Default::default()
    }
}

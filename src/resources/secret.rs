use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::controller::error::Result;
use crate::controller::sync::SyncOutcome;
use crate::crd::MysqlCluster;
use crate::resources::apply::apply_resource;
use crate::resources::common::owned_metadata;

pub const ROOT_PASSWORD_KEY: &str = "ROOT_PASSWORD";
pub const REPLICATION_USER_KEY: &str = "REPLICATION_USER";
pub const REPLICATION_PASSWORD_KEY: &str = "REPLICATION_PASSWORD";
pub const METRICS_EXPORTER_USER_KEY: &str = "METRICS_EXPORTER_USER";
pub const METRICS_EXPORTER_PASSWORD_KEY: &str = "METRICS_EXPORTER_PASSWORD";
pub const ORC_TOPOLOGY_USER_KEY: &str = "ORC_TOPOLOGY_USER";
pub const ORC_TOPOLOGY_PASSWORD_KEY: &str = "ORC_TOPOLOGY_PASSWORD";

/// Keys managed by the operator and the length of their generated value
const MANAGED_KEYS: [(&str, usize); 7] = [
    (ROOT_PASSWORD_KEY, 32),
    (REPLICATION_USER_KEY, 12),
    (REPLICATION_PASSWORD_KEY, 32),
    (METRICS_EXPORTER_USER_KEY, 12),
    (METRICS_EXPORTER_PASSWORD_KEY, 32),
    (ORC_TOPOLOGY_USER_KEY, 12),
    (ORC_TOPOLOGY_PASSWORD_KEY, 32),
];

/// Generate a secure random password
fn generate_password(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Generate the credentials Secret
///
/// Values already present in `existing` are kept, so credentials are never
/// rotated behind the cluster's back. Only missing keys are generated.
pub fn generate_credentials_secret(cluster: &MysqlCluster, existing: Option<&Secret>) -> Secret {
    let current = existing.and_then(|s| s.data.as_ref());

    let data: BTreeMap<String, ByteString> = MANAGED_KEYS
        .iter()
        .map(|(key, len)| {
            let value = current
                .and_then(|d| d.get(*key))
                .filter(|v| !v.0.is_empty())
                .cloned()
                .unwrap_or_else(|| ByteString(generate_password(*len).into_bytes()));
            (key.to_string(), value)
        })
        .collect();

    Secret {
        metadata: owned_metadata(cluster, cluster.secret_name()),
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// Hex SHA-256 over the Secret's keys and values
pub fn secret_hash(secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in secret.data.iter().flatten() {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(&value.0);
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Ensure the credentials Secret holds every managed key
pub async fn sync_credentials_secret(
    client: &Client,
    ns: &str,
    cluster: &MysqlCluster,
) -> Result<SyncOutcome> {
    let api: Api<Secret> = Api::namespaced(client.clone(), ns);
    let existing = api.get_opt(&cluster.secret_name()).await?;

    let secret = generate_credentials_secret(cluster, existing.as_ref());
    apply_resource(client, ns, &secret).await
}

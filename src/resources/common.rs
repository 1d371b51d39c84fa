//! Common utilities for Kubernetes resource generation
//!
//! Shared constants and metadata helpers used by every resource generator.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use kube::core::ObjectMeta;

use crate::crd::MysqlCluster;

/// API version for MysqlCluster CRD
pub const API_VERSION: &str = "mysql.presslabs.org/v1alpha1";

/// Kind for MysqlCluster CRD
pub const KIND: &str = "MysqlCluster";

/// Operator field manager name for server-side apply
pub const FIELD_MANAGER: &str = "mysql-operator";

/// Generate an owner reference for a MysqlCluster
///
/// Owned resources are garbage collected when the cluster is deleted.
pub fn owner_reference(cluster: &MysqlCluster) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: cluster.name_any(),
        uid: cluster.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Labels put on every resource owned by a cluster
///
/// A superset of the selector labels returned by [`MysqlCluster::labels`].
pub fn standard_labels(cluster: &MysqlCluster) -> BTreeMap<String, String> {
    let mut labels = cluster.labels();
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        FIELD_MANAGER.to_string(),
    );
    labels
}

/// Metadata for a resource owned by the cluster
pub fn owned_metadata(cluster: &MysqlCluster, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: cluster.namespace(),
        labels: Some(standard_labels(cluster)),
        owner_references: Some(vec![owner_reference(cluster)]),
        ..Default::default()
    }
}

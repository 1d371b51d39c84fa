use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::controller::sync::MYSQL_PORT;
use crate::crd::{MysqlCluster, ResourceName};
use crate::resources::common::owned_metadata;

/// Port of the Prometheus exporter sidecar
pub const EXPORTER_PORT: i32 = 9104;

/// Generate the headless Service that gives every member a stable DNS name
///
/// Member hosts resolve as `<statefulset>-<ordinal>.<service>.<namespace>`.
pub fn generate_headless_service(cluster: &MysqlCluster) -> Service {
    let name = cluster.name_for_resource(ResourceName::NetworkEndpoint);

    Service {
        metadata: owned_metadata(cluster, name),
        spec: Some(ServiceSpec {
            selector: Some(cluster.labels()),
            ports: Some(vec![
                ServicePort {
                    port: i32::from(MYSQL_PORT),
                    target_port: Some(IntOrString::Int(i32::from(MYSQL_PORT))),
                    name: Some("mysql".to_string()),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                },
                ServicePort {
                    port: EXPORTER_PORT,
                    target_port: Some(IntOrString::Int(EXPORTER_PORT)),
                    name: Some("prometheus".to_string()),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                },
            ]),
            type_: Some("ClusterIP".to_string()),
            cluster_ip: Some("None".to_string()),
            // Members must resolve before they are ready so replication can bootstrap
            publish_not_ready_addresses: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

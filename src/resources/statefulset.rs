//! StatefulSet generation for MySQL members
//!
//! One StatefulSet runs every member. Each pod carries the MySQL container and a
//! Prometheus exporter sidecar; data lives on a per-member PVC.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{
    RollingUpdateStatefulSetStrategy, StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy,
};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource,
    ExecAction, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodAffinityTerm,
    PodAntiAffinity, PodSpec, PodTemplateSpec, Probe, ResourceRequirements, Secret,
    SecretKeySelector,
    TCPSocketAction, Volume, VolumeMount, VolumeResourceRequirements, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::ObjectMeta;

use crate::controller::defaults::{DEFAULT_STORAGE_SIZE, DEFAULT_VOLUME_ACCESS_MODE};
use crate::controller::sync::MYSQL_PORT;
use crate::crd::{AntiAffinitySpec, MysqlCluster, ResourceList, ResourceName};
use crate::options::OperatorOptions;
use crate::resources::common::owned_metadata;
use crate::resources::config::config_hash;
use crate::resources::secret::{
    METRICS_EXPORTER_PASSWORD_KEY, METRICS_EXPORTER_USER_KEY, ROOT_PASSWORD_KEY, secret_hash,
};
use crate::resources::service::EXPORTER_PORT;

const DATA_VOLUME: &str = "data";
const CONFIG_VOLUME: &str = "conf";
const DATA_DIR: &str = "/var/lib/mysql";
const CONFIG_DIR: &str = "/etc/mysql/conf.d";

/// Pod template annotations that roll the members when their inputs change
pub const CONFIG_HASH_ANNOTATION: &str = "mysql.presslabs.org/config_hash";
pub const SECRET_HASH_ANNOTATION: &str = "mysql.presslabs.org/secret_hash";

fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: Some(false),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn quantities(list: &ResourceList) -> BTreeMap<String, Quantity> {
    let mut map = BTreeMap::new();
    if let Some(cpu) = &list.cpu {
        map.insert("cpu".to_string(), Quantity(cpu.clone()));
    }
    if let Some(memory) = &list.memory {
        map.insert("memory".to_string(), Quantity(memory.clone()));
    }
    map
}

fn container_resources(cluster: &MysqlCluster) -> ResourceRequirements {
    let resources = &cluster.spec.pod_spec.resources;
    ResourceRequirements {
        limits: resources.limits.as_ref().map(quantities),
        requests: resources.requests.as_ref().map(quantities),
        ..Default::default()
    }
}

fn generate_anti_affinity(spec: &AntiAffinitySpec) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: spec.weight,
                    pod_affinity_term: PodAffinityTerm {
                        label_selector: Some(LabelSelector {
                            match_labels: Some(spec.match_labels.clone()),
                            ..Default::default()
                        }),
                        topology_key: spec.topology_key.clone(),
                        ..Default::default()
                    },
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mysql_container(cluster: &MysqlCluster, options: &OperatorOptions) -> Container {
    let version = cluster
        .spec
        .mysql_version
        .as_deref()
        .unwrap_or(&options.mysql_image_tag);
    let pull_policy = cluster
        .spec
        .pod_spec
        .image_pull_policy
        .clone()
        .unwrap_or_else(|| options.image_pull_policy.clone());

    let tcp_probe = |initial_delay: i32, failure_threshold: i32| Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(i32::from(MYSQL_PORT)),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(10),
        timeout_seconds: Some(5),
        failure_threshold: Some(failure_threshold),
        ..Default::default()
    };

    Container {
        name: "mysql".to_string(),
        image: Some(options.mysql_image_for(version)),
        image_pull_policy: Some(pull_policy),
        ports: Some(vec![ContainerPort {
            container_port: i32::from(MYSQL_PORT),
            name: Some("mysql".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(vec![secret_env(
            "MYSQL_ROOT_PASSWORD",
            &cluster.secret_name(),
            ROOT_PASSWORD_KEY,
        )]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: DATA_VOLUME.to_string(),
                mount_path: DATA_DIR.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: CONFIG_VOLUME.to_string(),
                mount_path: CONFIG_DIR.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
        ]),
        resources: Some(container_resources(cluster)),
        readiness_probe: Some(Probe {
            exec: Some(ExecAction {
                command: Some(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "mysqladmin ping -uroot -p\"$MYSQL_ROOT_PASSWORD\" -h127.0.0.1".to_string(),
                ]),
            }),
            initial_delay_seconds: Some(5),
            period_seconds: Some(10),
            timeout_seconds: Some(5),
            failure_threshold: Some(3),
            ..Default::default()
        }),
        liveness_probe: Some(tcp_probe(30, 6)),
        ..Default::default()
    }
}

fn exporter_container(cluster: &MysqlCluster, options: &OperatorOptions) -> Container {
    let secret = cluster.secret_name();

    Container {
        name: "metrics-exporter".to_string(),
        image: Some(options.metrics_exporter_image.clone()),
        image_pull_policy: Some(options.image_pull_policy.clone()),
        ports: Some(vec![ContainerPort {
            container_port: EXPORTER_PORT,
            name: Some("prometheus".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(vec![
            secret_env("USER", &secret, METRICS_EXPORTER_USER_KEY),
            secret_env("PASSWORD", &secret, METRICS_EXPORTER_PASSWORD_KEY),
            EnvVar {
                name: "DATA_SOURCE_NAME".to_string(),
                value: Some(format!("$(USER):$(PASSWORD)@(127.0.0.1:{})/", MYSQL_PORT)),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

fn data_volume_claim(cluster: &MysqlCluster) -> PersistentVolumeClaim {
    let volume = &cluster.spec.volume_spec;
    let access_modes = if volume.access_modes.is_empty() {
        vec![DEFAULT_VOLUME_ACCESS_MODE.to_string()]
    } else {
        volume.access_modes.clone()
    };
    let size = volume
        .size
        .clone()
        .unwrap_or_else(|| DEFAULT_STORAGE_SIZE.to_string());

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DATA_VOLUME.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(access_modes),
            storage_class_name: volume.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([("storage".to_string(), Quantity(size))])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate the StatefulSet running the cluster members
pub fn generate_statefulset(cluster: &MysqlCluster, options: &OperatorOptions) -> StatefulSet {
    let name = cluster.name_for_resource(ResourceName::Workload);
    let selector = cluster.labels();

    let volumes = vec![Volume {
        name: CONFIG_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: cluster.name_for_resource(ResourceName::ConfigArtifact),
            default_mode: Some(0o644),
            ..Default::default()
        }),
        ..Default::default()
    }];

    StatefulSet {
        metadata: owned_metadata(cluster, name),
        spec: Some(StatefulSetSpec {
            service_name: Some(cluster.name_for_resource(ResourceName::NetworkEndpoint)),
            replicas: Some(cluster.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(selector.clone()),
                ..Default::default()
            },
            update_strategy: Some(StatefulSetUpdateStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateStatefulSetStrategy {
                    partition: Some(0),
                    ..Default::default()
                }),
            }),
            pod_management_policy: Some("OrderedReady".to_string()),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector),
                    annotations: Some(BTreeMap::from([(
                        CONFIG_HASH_ANNOTATION.to_string(),
                        config_hash(cluster),
                    )])),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![
                        mysql_container(cluster, options),
                        exporter_container(cluster, options),
                    ],
                    volumes: Some(volumes),
                    affinity: cluster
                        .spec
                        .pod_spec
                        .anti_affinity
                        .as_ref()
                        .map(generate_anti_affinity),
                    termination_grace_period_seconds: Some(30),
                    ..Default::default()
                }),
            },
            volume_claim_templates: Some(vec![data_volume_claim(cluster)]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Record the credentials hash on the pod template
pub fn annotate_secret_hash(sts: &mut StatefulSet, secret: &Secret) {
    if let Some(metadata) = sts
        .spec
        .as_mut()
        .and_then(|spec| spec.template.metadata.as_mut())
    {
        metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(SECRET_HASH_ANNOTATION.to_string(), secret_hash(secret));
    }
}

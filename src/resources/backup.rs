//! Scheduled backups
//!
//! A cluster with `backupSchedule` set gets a CronJob that runs the helper
//! image against a replica and uploads the dump to `backupUri`.
//!
//! The job targets `status.healthySlaveHost` when one has been resolved and the
//! first member otherwise, so a freshly created cluster still gets a valid
//! target. The host is refreshed on every reconciliation.

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvFromSource, PodSpec, PodTemplateSpec, SecretEnvSource,
};
use kube::core::ObjectMeta;

use crate::controller::error::{Error, Result};
use crate::crd::{MysqlCluster, ResourceName};
use crate::options::OperatorOptions;
use crate::resources::common::{owned_metadata, standard_labels};

/// Host the backup job reads from
pub fn backup_source_host(cluster: &MysqlCluster) -> String {
    cluster
        .status
        .as_ref()
        .and_then(|s| s.healthy_slave_host.clone())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| cluster.member_host(0))
}

/// Generate the backup CronJob
///
/// Returns `Ok(None)` when no schedule is configured.
///
/// # Errors
/// Returns `Error::InvalidConfig` when a schedule is set without `backupUri`.
pub fn generate_backup_cronjob(
    cluster: &MysqlCluster,
    options: &OperatorOptions,
) -> Result<Option<CronJob>> {
    let Some(schedule) = cluster
        .spec
        .backup_schedule
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    else {
        return Ok(None);
    };

    let backup_uri = cluster
        .spec
        .backup_uri
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            Error::InvalidConfig("backupSchedule is set but backupUri is empty".to_string())
        })?;

    let env_from = cluster.spec.backup_secret_name.as_ref().map(|name| {
        vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: name.clone(),
                optional: Some(false),
            }),
            ..Default::default()
        }]
    });

    let container = Container {
        name: "backup".to_string(),
        image: Some(options.helper_image.clone()),
        image_pull_policy: Some(options.image_pull_policy.clone()),
        args: Some(vec![
            "take-backup-to".to_string(),
            backup_source_host(cluster),
            backup_uri.to_string(),
        ]),
        env_from,
        ..Default::default()
    };

    let cronjob = CronJob {
        metadata: owned_metadata(
            cluster,
            cluster.name_for_resource(ResourceName::BackupSchedule),
        ),
        spec: Some(CronJobSpec {
            schedule: schedule.to_string(),
            concurrency_policy: Some("Forbid".to_string()),
            successful_jobs_history_limit: Some(3),
            failed_jobs_history_limit: Some(1),
            job_template: JobTemplateSpec {
                metadata: None,
                spec: Some(JobSpec {
                    backoff_limit: Some(2),
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(standard_labels(cluster)),
                            ..Default::default()
                        }),
                        spec: Some(PodSpec {
                            containers: vec![container],
                            restart_policy: Some("OnFailure".to_string()),
                            ..Default::default()
                        }),
                    },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(Some(cronjob))
}

//! Kubernetes-backed [`ResourceSyncer`]

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::controller::error::{Error, Result};
use crate::controller::sync::{ResourceSyncer, SyncOutcome};
use crate::crd::{MysqlCluster, ResourceName};
use crate::options::OperatorOptions;
use crate::resources::apply::apply_resource;
use crate::resources::backup::generate_backup_cronjob;
use crate::resources::config::generate_config_map;
use crate::resources::secret::sync_credentials_secret;
use crate::resources::service::generate_headless_service;
use crate::resources::statefulset::{annotate_secret_hash, generate_statefulset};

/// Applies the generated resources with server-side apply
pub struct KubeResourceSyncer {
    client: Client,
    options: Arc<OperatorOptions>,
}

impl KubeResourceSyncer {
    pub fn new(client: Client, options: Arc<OperatorOptions>) -> Self {
        Self { client, options }
    }

    async fn sync_workload(&self, ns: &str, cluster: &MysqlCluster) -> Result<SyncOutcome> {
        let mut sts = generate_statefulset(cluster, &self.options);

        // The Secret is synced first, so it is normally present here
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), ns);
        if let Some(secret) = secrets.get_opt(&cluster.secret_name()).await? {
            annotate_secret_hash(&mut sts, &secret);
        }

        apply_resource(&self.client, ns, &sts).await
    }

    async fn sync_backup(&self, ns: &str, cluster: &MysqlCluster) -> Result<SyncOutcome> {
        match generate_backup_cronjob(cluster, &self.options)? {
            Some(job) => apply_resource(&self.client, ns, &job).await,
            None => {
                // A schedule that was removed leaves no CronJob behind
                let name = cluster.name_for_resource(ResourceName::BackupSchedule);
                let api: Api<CronJob> = Api::namespaced(self.client.clone(), ns);
                if api.get_opt(&name).await?.is_some() {
                    api.delete(&name, &Default::default()).await?;
                    debug!(name = %name, "Deleted backup CronJob");
                }
                Ok(SyncOutcome::Skipped)
            }
        }
    }
}

#[async_trait]
impl ResourceSyncer for KubeResourceSyncer {
    async fn sync(&self, kind: ResourceName, cluster: &MysqlCluster) -> Result<SyncOutcome, Error> {
        let ns = cluster
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;

        match kind {
            ResourceName::Secret => sync_credentials_secret(&self.client, &ns, cluster).await,
            ResourceName::ConfigArtifact => {
                apply_resource(&self.client, &ns, &generate_config_map(cluster)).await
            }
            ResourceName::NetworkEndpoint => {
                apply_resource(&self.client, &ns, &generate_headless_service(cluster)).await
            }
            ResourceName::Workload => self.sync_workload(&ns, cluster).await,
            ResourceName::BackupSchedule => self.sync_backup(&ns, cluster).await,
        }
    }
}

pub mod controller;
pub mod crd;
pub mod health;
pub mod options;
pub mod resources;
pub mod topology;

pub use controller::{
    BackoffConfig, Context, Error, EventSink, KubeEventSink, ResourceSyncer, Result, SyncError,
    SyncOutcome, SyncReport, Synchronizer, error_policy, reconcile,
};
pub use crd::{MysqlCluster, ResourceName};
pub use health::{HealthState, Metrics};
pub use options::OperatorOptions;
pub use resources::KubeResourceSyncer;
pub use topology::{OrchestratorConnector, TopologyClient, TopologyConnector, TopologyResolver};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::runtime::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Run the MysqlCluster controller until `ctx.shutdown` is cancelled.
///
/// When `namespace` is `Some(ns)`, only watches resources in that namespace.
/// When `namespace` is `None`, watches resources cluster-wide.
pub async fn run_controller(ctx: Arc<Context>, namespace: Option<&str>) {
    let scope_msg = namespace.unwrap_or("cluster-wide");
    tracing::info!(
        "Starting controller for MysqlCluster resources (scope: {})",
        scope_msg
    );

    if let Some(ref state) = ctx.health_state {
        state.set_ready(true).await;
    }

    let client = ctx.client.clone();
    let shutdown = ctx.shutdown.clone();

    let clusters: Api<MysqlCluster> = scoped_api(client.clone(), namespace);
    let statefulsets: Api<StatefulSet> = scoped_api(client.clone(), namespace);
    let services: Api<Service> = scoped_api(client.clone(), namespace);
    let configmaps: Api<ConfigMap> = scoped_api(client.clone(), namespace);
    let secrets: Api<Secret> = scoped_api(client.clone(), namespace);
    let cronjobs: Api<CronJob> = scoped_api(client, namespace);

    let watcher_config = WatcherConfig::default().any_semantic();

    // Watch MysqlCluster and all owned resources to trigger reconciliation
    Controller::new(clusters, watcher_config.clone())
        .owns(statefulsets, watcher_config.clone())
        .owns(services, watcher_config.clone())
        .owns(configmaps, watcher_config.clone())
        .owns(secrets, watcher_config.clone())
        .owns(cronjobs, watcher_config)
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // Related watch events can still fire for a cluster that was just deleted
                    let is_not_found = matches!(
                        &e,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) if err.is_not_found()
                    );
                    if is_not_found {
                        tracing::debug!("Object no longer exists (likely deleted): {:?}", e);
                    } else {
                        tracing::error!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::info!("Controller stopped");
}

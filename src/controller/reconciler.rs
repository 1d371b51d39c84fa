//! Reconciliation logic for MysqlCluster resources
//!
//! One pass defaults the spec, converges the managed resources in order,
//! observes the StatefulSet and orchestrator, then writes the status.

use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::apps::v1::StatefulSet;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::controller::context::{Context, RetryTracker};
use crate::controller::defaults::apply_defaults;
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::status::{Observation, StatusManager};
use crate::controller::sync::{EventReasons, SyncError, Synchronizer};
use crate::crd::{MysqlCluster, MysqlClusterStatus, ResourceName};
use crate::topology::TopologyResolver;

/// Delay before a healthy cluster is looked at again
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(30);

fn retry_key(cluster: &MysqlCluster) -> String {
    format!(
        "{}/{}",
        cluster.namespace().unwrap_or_default(),
        cluster.name_any()
    )
}

/// Main reconciliation function
#[instrument(skip(cluster, ctx), fields(name = %cluster.name_any(), namespace = cluster.namespace().unwrap_or_default()))]
pub async fn reconcile(cluster: Arc<MysqlCluster>, ctx: Arc<Context>) -> Result<Action> {
    let ns = cluster
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = cluster.name_any();
    let started = Instant::now();

    debug!("Reconciling MysqlCluster");

    if cluster.metadata.deletion_timestamp.is_some() {
        return Ok(on_deletion(&cluster, &ctx.retries));
    }

    let result = reconcile_cluster(&cluster, &ctx, &ns).await;

    if let Some(health) = &ctx.health_state {
        match &result {
            Ok(_) => {
                health
                    .metrics
                    .record_reconcile(&ns, &name, started.elapsed().as_secs_f64());
                health.touch_reconcile();
            }
            Err(_) => health.metrics.record_error(&ns, &name),
        }
    }

    match result {
        Ok(action) => {
            ctx.reset_failures(&retry_key(&cluster));
            info!("Reconciliation completed successfully");
            Ok(action)
        }
        Err(Error::SyncError(SyncError::Cancelled)) => {
            info!("Reconciliation interrupted by shutdown");
            Ok(Action::await_change())
        }
        Err(e) => {
            error!("Reconciliation failed: {}", e);
            if let (Some(health), Error::SyncError(sync)) = (&ctx.health_state, &e) {
                health.metrics.record_sync_error(sync);
            }
            let reason = match &e {
                Error::SyncError(sync) => sync
                    .kind()
                    .map(|kind| EventReasons::for_kind(kind).failed)
                    .unwrap_or("SyncFailed"),
                Error::InvalidConfig(_) => "InvalidConfig",
                _ => "ReconcileFailed",
            };
            let status_manager = StatusManager::new(&cluster, &ctx, &ns);
            if let Err(status_err) = status_manager.set_failed(reason, &e.to_string()).await {
                warn!("Failed to record failure in status: {}", status_err);
            }
            Err(e)
        }
    }
}

/// A deleted cluster only waits for garbage collection of its owned resources
fn on_deletion(cluster: &MysqlCluster, retries: &RetryTracker) -> Action {
    retries.reset(&retry_key(cluster));
    debug!("MysqlCluster is being deleted");
    Action::await_change()
}

/// Error policy for the controller with exponential backoff
pub fn error_policy(cluster: Arc<MysqlCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = cluster.name_any();
    let attempt = ctx.record_failure(&retry_key(&cluster));
    let delay = BackoffConfig::default().delay_for_error(error, attempt);

    if error.is_retryable() {
        warn!(
            "Retryable error for {}: {:?}, requeuing in {:?}",
            name, error, delay
        );
    } else {
        error!(
            "Non-retryable error for {}: {:?}, requeuing in {:?} for manual intervention",
            name, error, delay
        );
    }

    Action::requeue(delay)
}

async fn reconcile_cluster(cluster: &MysqlCluster, ctx: &Context, ns: &str) -> Result<Action> {
    let name = cluster.name_any();

    let mut desired = cluster.clone();
    apply_defaults(&mut desired, &ctx.options)?;

    // A child token lets a shutdown stop this run between resources
    let cancel = ctx.shutdown.child_token();
    let synchronizer = Synchronizer::new(
        ctx.syncer.as_ref(),
        ctx.events.as_ref(),
        ctx.topology.as_ref(),
    );
    let report = synchronizer.synchronize(&cancel, &desired).await?;

    for warning in &report.warnings {
        warn!(
            host = warning.host.as_deref().unwrap_or("-"),
            "Orchestrator registration: {}", warning.message
        );
    }
    if let Some(health) = &ctx.health_state {
        health.metrics.record_sync_report(ns, &name, &report);
    }

    let ready_nodes = statefulset_ready_replicas(ctx, ns, &desired).await?;
    if let Some(health) = &ctx.health_state {
        health.metrics.set_cluster_replicas(
            ns,
            &name,
            i64::from(desired.spec.replicas),
            i64::from(ready_nodes),
        );
    }

    // Resolve hosts against what was just observed, not the stale status
    let mut observed_cluster = desired;
    observed_cluster
        .status
        .get_or_insert_with(MysqlClusterStatus::default)
        .ready_nodes = ready_nodes;

    let resolver = TopologyResolver::new(ctx.topology.as_ref());
    let observation = Observation {
        ready_nodes,
        master_host: resolver.resolve_primary(&observed_cluster).await,
        healthy_slave_host: resolver.resolve_healthy_secondary(&observed_cluster).await,
    };
    debug!(
        ready = ready_nodes,
        master = %observation.master_host,
        healthy_slave = %observation.healthy_slave_host,
        "Observed cluster topology"
    );

    StatusManager::new(cluster, ctx, ns)
        .set_synced(&observation)
        .await?;

    Ok(Action::requeue(RESYNC_INTERVAL))
}

/// Ready replica count of the cluster StatefulSet, zero if it does not exist yet
async fn statefulset_ready_replicas(ctx: &Context, ns: &str, cluster: &MysqlCluster) -> Result<i32> {
    let api: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), ns);
    let sts = api
        .get_opt(&cluster.name_for_resource(ResourceName::Workload))
        .await?;

    Ok(sts
        .and_then(|s| s.status)
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0))
}

//! Ordered synchronization of the resources that make up a MysqlCluster
//!
//! A cluster is backed by five resources that are converged one after the
//! other, in a fixed order where each step may depend on the previous ones
//! (the StatefulSet references the headless Service by name, for example):
//!
//! 1. credentials Secret
//! 2. `my.cnf` ConfigMap
//! 3. headless Service
//! 4. StatefulSet
//! 5. backup CronJob
//!
//! The first failure stops the run. Each Created or Updated outcome emits one
//! Normal event and a failure emits one Warning event. Once every resource is
//! in sync, ready members are registered with orchestrator on a best-effort
//! basis: registration problems are collected as warnings and never fail the
//! run.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::controller::error::Error;
use crate::controller::events::{EventSeverity, EventSink, reasons};
use crate::crd::{MysqlCluster, ResourceName};
use crate::topology::TopologyConnector;

/// MySQL port registered with orchestrator
pub const MYSQL_PORT: u16 = 3306;

/// Result of converging one resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncOutcome {
    UpToDate,
    Created,
    Updated,
    Skipped,
    Failed,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncOutcome::UpToDate => "up-to-date",
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Skipped => "skipped",
            SyncOutcome::Failed => "failed",
        }
    }

    /// Whether the outcome changed the cluster and deserves an event
    pub fn is_change(self) -> bool {
        matches!(self, SyncOutcome::Created | SyncOutcome::Updated)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converges one kind of managed resource to its desired state
///
/// Implementations must be idempotent. Failures are reported through the
/// error; the outcome is only meaningful on success.
#[async_trait]
pub trait ResourceSyncer: Send + Sync {
    async fn sync(&self, kind: ResourceName, cluster: &MysqlCluster) -> Result<SyncOutcome, Error>;
}

/// Event reasons used for one resource kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventReasons {
    pub failed: &'static str,
    pub updated: &'static str,
}

impl EventReasons {
    pub fn for_kind(kind: ResourceName) -> Self {
        let (failed, updated) = match kind {
            ResourceName::Secret => (reasons::DB_SECRET_FAILED, reasons::DB_SECRET_UPDATED),
            ResourceName::ConfigArtifact => {
                (reasons::CONFIG_MAP_FAILED, reasons::CONFIG_MAP_UPDATED)
            }
            ResourceName::NetworkEndpoint => (reasons::SERVICE_FAILED, reasons::SERVICE_UPDATED),
            ResourceName::Workload => (reasons::SFS_FAILED, reasons::SFS_UPDATED),
            ResourceName::BackupSchedule => (reasons::CRON_JOB_FAILED, reasons::CRON_JOB_UPDATED),
        };
        Self { failed, updated }
    }
}

/// One entry of the synchronization table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncUnit {
    /// Name shown in logs
    pub alias: &'static str,
    pub kind: ResourceName,
    /// Name of the target resource
    pub name: String,
    pub reasons: EventReasons,
}

/// The synchronization table for a cluster, in execution order
pub fn sync_units(cluster: &MysqlCluster) -> Vec<SyncUnit> {
    ResourceName::ORDERED
        .into_iter()
        .map(|kind| SyncUnit {
            alias: kind.alias(),
            kind,
            name: match kind {
                ResourceName::Secret => cluster.secret_name(),
                _ => cluster.name_for_resource(kind),
            },
            reasons: EventReasons::for_kind(kind),
        })
        .collect()
}

/// Fatal synchronization error
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A resource could not be converged; later resources were not attempted
    #[error("{name} sync failed: {source}")]
    Resource {
        name: String,
        kind: ResourceName,
        source: Box<Error>,
    },

    /// Cancellation was requested between two resources
    #[error("synchronization cancelled")]
    Cancelled,
}

impl SyncError {
    /// Kind of the resource that failed, if any
    pub fn kind(&self) -> Option<ResourceName> {
        match self {
            SyncError::Resource { kind, .. } => Some(*kind),
            SyncError::Cancelled => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Resource { source, .. } => source.is_retryable(),
            SyncError::Cancelled => true,
        }
    }
}

/// Non-fatal problem while registering members with orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationWarning {
    /// Member that failed to register; `None` when the client could not be built
    pub host: Option<String>,
    pub message: String,
}

/// Outcome of a successful synchronization
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Outcome per resource, in execution order
    pub outcomes: Vec<(ResourceName, SyncOutcome)>,
    /// Best-effort registration problems
    pub warnings: Vec<RegistrationWarning>,
}

impl SyncReport {
    pub fn outcome(&self, kind: ResourceName) -> Option<SyncOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| *outcome)
    }
}

/// Runs the synchronization table against one cluster
pub struct Synchronizer<'a> {
    syncer: &'a dyn ResourceSyncer,
    events: &'a dyn EventSink,
    topology: &'a dyn TopologyConnector,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        syncer: &'a dyn ResourceSyncer,
        events: &'a dyn EventSink,
        topology: &'a dyn TopologyConnector,
    ) -> Self {
        Self {
            syncer,
            events,
            topology,
        }
    }

    /// Converge every managed resource of the cluster, in order
    ///
    /// Cancellation is observed between resources, never in the middle of one.
    ///
    /// # Errors
    /// Returns the first resource failure, wrapped with the resource name, or
    /// `SyncError::Cancelled`.
    pub async fn synchronize(
        &self,
        cancel: &CancellationToken,
        cluster: &MysqlCluster,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        for unit in sync_units(cluster) {
            if cancel.is_cancelled() {
                debug!(next = unit.alias, "Synchronization cancelled");
                return Err(SyncError::Cancelled);
            }

            let outcome = match self.syncer.sync(unit.kind, cluster).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("[{}]: failed syncing {}: {}", unit.alias, unit.name, e);
                    let err = SyncError::Resource {
                        name: unit.name,
                        kind: unit.kind,
                        source: Box::new(e),
                    };
                    self.events
                        .emit(
                            cluster,
                            EventSeverity::Warning,
                            unit.reasons.failed,
                            &err.to_string(),
                        )
                        .await;
                    return Err(err);
                }
            };

            debug!("[{}]: {} ... ({})", unit.alias, unit.name, outcome);

            if outcome.is_change() {
                self.events
                    .emit(
                        cluster,
                        EventSeverity::Normal,
                        unit.reasons.updated,
                        &format!("{} {}", unit.name, outcome),
                    )
                    .await;
            }

            report.outcomes.push((unit.kind, outcome));
        }

        report.warnings = self.register_ready_members(cancel, cluster).await;
        Ok(report)
    }

    /// Register every ready member with orchestrator, if one is configured
    async fn register_ready_members(
        &self,
        cancel: &CancellationToken,
        cluster: &MysqlCluster,
    ) -> Vec<RegistrationWarning> {
        let Some(uri) = cluster.orchestrator_uri() else {
            return Vec::new();
        };

        let client = match self.topology.connect(uri) {
            Ok(client) => client,
            Err(e) => {
                warn!(uri = uri, error = %e, "Failed to create orchestrator client");
                return vec![RegistrationWarning {
                    host: None,
                    message: e.to_string(),
                }];
            }
        };

        let mut warnings = Vec::new();
        for ordinal in 0..cluster.ready_nodes() {
            if cancel.is_cancelled() {
                debug!("Member registration cancelled");
                break;
            }

            let host = cluster.member_host(ordinal);
            if let Err(e) = client.discover(&host, MYSQL_PORT).await {
                warn!("Failed to register {} with orchestrator: {}", host, e);
                warnings.push(RegistrationWarning {
                    host: Some(host),
                    message: e.to_string(),
                });
            }
        }
        warnings
    }
}

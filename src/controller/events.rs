//! Kubernetes event emission for MysqlCluster resources

use async_trait::async_trait;
use kube::Client;
use kube::Resource;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

use crate::crd::MysqlCluster;

/// Controller name reported on emitted events
pub const REPORTER_NAME: &str = "mysql-operator";

/// Event reasons, one failure/update pair per managed resource
pub mod reasons {
    pub const DB_SECRET_FAILED: &str = "DbSecretFailed";
    pub const DB_SECRET_UPDATED: &str = "DbSecretUpdated";
    pub const CONFIG_MAP_FAILED: &str = "ConfigMapFailed";
    pub const CONFIG_MAP_UPDATED: &str = "ConfigMapUpdated";
    pub const SERVICE_FAILED: &str = "ServiceFailed";
    pub const SERVICE_UPDATED: &str = "ServiceUpdated";
    pub const SFS_FAILED: &str = "SFSFailed";
    pub const SFS_UPDATED: &str = "SFSUpdated";
    pub const CRON_JOB_FAILED: &str = "CronJobFailed";
    pub const CRON_JOB_UPDATED: &str = "CronJobUpdated";
}

/// Event severity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

impl From<EventSeverity> for EventType {
    fn from(severity: EventSeverity) -> Self {
        match severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        }
    }
}

/// Destination for cluster events
///
/// Emission is fire-and-forget: failures are logged by the sink and never
/// reach the caller.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(
        &self,
        cluster: &MysqlCluster,
        severity: EventSeverity,
        reason: &str,
        message: &str,
    );
}

/// Publishes events through the Kubernetes events API
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    pub fn new(client: Client, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: REPORTER_NAME.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn emit(
        &self,
        cluster: &MysqlCluster,
        severity: EventSeverity,
        reason: &str,
        message: &str,
    ) {
        let event = Event {
            type_: severity.into(),
            reason: reason.to_string(),
            note: (!message.is_empty()).then(|| message.to_string()),
            action: "Reconciling".to_string(),
            secondary: None,
        };

        let reference = cluster.object_ref(&());
        if let Err(e) = self.recorder.publish(&event, &reference).await {
            warn!(reason = reason, error = %e, "Failed to publish event");
        }
    }
}

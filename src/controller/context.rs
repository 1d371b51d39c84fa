use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::controller::events::EventSink;
use crate::controller::sync::ResourceSyncer;
use crate::health::HealthState;
use crate::options::OperatorOptions;
use crate::topology::TopologyConnector;

/// Consecutive failures per cluster, keyed by `namespace/name`
#[derive(Clone, Default)]
pub struct RetryTracker {
    counts: Arc<Mutex<HashMap<String, u32>>>,
}

impl RetryTracker {
    /// Count a failure and return how many happened in a row before it
    pub fn record_failure(&self, key: &str) -> u32 {
        let Ok(mut counts) = self.counts.lock() else {
            return 0;
        };
        let count = counts.entry(key.to_string()).or_insert(0);
        let previous = *count;
        *count = count.saturating_add(1);
        previous
    }

    /// Forget the failures of a cluster
    pub fn reset(&self, key: &str) {
        if let Ok(mut counts) = self.counts.lock() {
            counts.remove(key);
        }
    }

    /// Number of clusters with outstanding failures
    pub fn tracked(&self) -> usize {
        self.counts.lock().map(|c| c.len()).unwrap_or_default()
    }
}

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Operator-wide options
    pub options: Arc<OperatorOptions>,
    /// Converges the managed resources of a cluster
    pub syncer: Arc<dyn ResourceSyncer>,
    /// Where sync events are published
    pub events: Arc<dyn EventSink>,
    /// Builds orchestrator clients
    pub topology: Arc<dyn TopologyConnector>,
    /// Health state for metrics (optional)
    pub health_state: Option<Arc<HealthState>>,
    /// Cancelled when the operator shuts down
    pub shutdown: CancellationToken,
    /// Consecutive failures per cluster
    pub retries: RetryTracker,
}

impl Context {
    pub fn new(
        client: Client,
        options: Arc<OperatorOptions>,
        syncer: Arc<dyn ResourceSyncer>,
        events: Arc<dyn EventSink>,
        topology: Arc<dyn TopologyConnector>,
        health_state: Option<Arc<HealthState>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            options,
            syncer,
            events,
            topology,
            health_state,
            shutdown,
            retries: RetryTracker::default(),
        }
    }

    /// Count a failure and return how many happened in a row before it
    pub fn record_failure(&self, key: &str) -> u32 {
        self.retries.record_failure(key)
    }

    /// Forget the failures of a cluster
    pub fn reset_failures(&self, key: &str) {
        self.retries.reset(key);
    }
}

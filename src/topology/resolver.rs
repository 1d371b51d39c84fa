//! Master and healthy replica resolution
//!
//! Both lookups are total: when no authority is configured, or the authority
//! cannot be reached, a host derived from the StatefulSet ordinals is
//! returned instead.

use tracing::{debug, warn};

use crate::crd::MysqlCluster;
use crate::topology::client::{Instance, TopologyConnector};

/// Maximum replication lag, in seconds, of a replica considered healthy
pub const HEALTHY_LAG_THRESHOLD_SECS: i64 = 5;

/// Resolves the master and a healthy replica of a cluster
pub struct TopologyResolver<'a> {
    connector: &'a dyn TopologyConnector,
}

impl<'a> TopologyResolver<'a> {
    pub fn new(connector: &'a dyn TopologyConnector) -> Self {
        Self { connector }
    }

    /// Host of the current master
    ///
    /// Defaults to member 0 and asks orchestrator when one is configured.
    pub async fn resolve_primary(&self, cluster: &MysqlCluster) -> String {
        let default_host = cluster.member_host(0);

        let Some(uri) = cluster.orchestrator_uri() else {
            return default_host;
        };

        let alias = cluster.orchestrator_cluster_alias();
        let client = match self.connector.connect(uri) {
            Ok(client) => client,
            Err(e) => {
                warn!(cluster = %alias, error = %e, "Failed to connect to orchestrator, falling back to default master");
                return default_host;
            }
        };

        match client.master(&alias).await {
            Ok(instance) => {
                debug!(cluster = %alias, host = %instance.hostname, "Orchestrator reported master");
                instance.hostname
            }
            Err(e) => {
                warn!(cluster = %alias, error = %e, "Failed getting master, falling back to default");
                default_host
            }
        }
    }

    /// Host of a replica that is safe to read from
    ///
    /// Defaults to the highest ready ordinal. When orchestrator is configured,
    /// the last replica in its answer with a known lag of at most
    /// [`HEALTHY_LAG_THRESHOLD_SECS`] wins.
    pub async fn resolve_healthy_secondary(&self, cluster: &MysqlCluster) -> String {
        let ready = cluster.ready_nodes();
        if ready < 1 {
            let host = cluster.member_host(0);
            warn!(host = %host, "No ready nodes yet, using the first member as replica host");
            return host;
        }

        let default_host = cluster.member_host(ready - 1);

        let Some(uri) = cluster.orchestrator_uri() else {
            debug!(host = %default_host, "Resolved replica host");
            return default_host;
        };

        let alias = cluster.orchestrator_cluster_alias();
        let client = match self.connector.connect(uri) {
            Ok(client) => client,
            Err(e) => {
                warn!(cluster = %alias, error = %e, "Failed to connect to orchestrator, falling back to last ready member");
                return default_host;
            }
        };

        let replicas = match client.replicas(&alias).await {
            Ok(replicas) => replicas,
            Err(e) => {
                warn!(cluster = %alias, error = %e, "Orchestrator replica query failed, falling back to last ready member");
                return default_host;
            }
        };

        let host = last_healthy(&replicas)
            .map(|r| r.hostname.clone())
            .unwrap_or(default_host);
        debug!(cluster = %alias, host = %host, "Resolved replica host");
        host
    }
}

/// Last replica with a known lag within the threshold
fn last_healthy(replicas: &[Instance]) -> Option<&Instance> {
    replicas.iter().rfind(|r| {
        r.replication_lag
            .is_some_and(|lag| lag <= HEALTHY_LAG_THRESHOLD_SECS)
    })
}

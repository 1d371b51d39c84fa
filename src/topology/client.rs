//! Topology authority interface
//!
//! The operator never decides which member is the master. It asks an
//! external authority (orchestrator) and only reads what it reports.

use std::sync::Arc;

use async_trait::async_trait;

/// Result type for topology operations
pub type Result<T, E = TopologyError> = std::result::Result<T, E>;

/// Errors returned by a topology authority
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The authority address could not be parsed
    #[error("Invalid topology address {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Connection error (transient - network issue)
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    /// HTTP request error (transient - network issue)
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Request timed out (transient)
    #[error("Request timed out")]
    Timeout,

    /// The authority answered with an error payload
    #[error("Orchestrator error: {0}")]
    Api(String),

    /// JSON parsing error (permanent - response was malformed)
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A cluster member as seen by the topology authority
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    pub hostname: String,
    pub port: u16,
    /// Seconds behind the master; `None` when the authority does not know
    pub replication_lag: Option<i64>,
}

impl Instance {
    pub fn new(hostname: impl Into<String>, replication_lag: Option<i64>) -> Self {
        Self {
            hostname: hostname.into(),
            port: crate::controller::sync::MYSQL_PORT,
            replication_lag,
        }
    }
}

/// Client for an external topology authority
#[async_trait]
pub trait TopologyClient: Send + Sync {
    /// Register a member address with the authority
    async fn discover(&self, host: &str, port: u16) -> Result<()>;

    /// Current master of a cluster
    async fn master(&self, cluster_alias: &str) -> Result<Instance>;

    /// Replicas of a cluster, in the authority's order
    async fn replicas(&self, cluster_alias: &str) -> Result<Vec<Instance>>;
}

/// Builds a topology client for an authority address
pub trait TopologyConnector: Send + Sync {
    fn connect(&self, uri: &str) -> Result<Arc<dyn TopologyClient>>;
}

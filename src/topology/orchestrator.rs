//! HTTP client for the orchestrator REST API
//!
//! Only the three endpoints the operator needs are implemented:
//! - `GET {base}/discover/{host}/{port}`
//! - `GET {base}/master/{cluster}`
//! - `GET {base}/cluster-osc-replicas/{cluster}`
//!
//! Requests go over plain HTTP/1.1, one connection per request, bounded by an
//! overall timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::{Request, Uri};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::topology::client::{
    Instance, Result, TopologyClient, TopologyConnector, TopologyError,
};

/// Orchestrator's instance key
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceKey {
    hostname: String,
    #[serde(default)]
    port: u16,
}

/// Go `sql.NullInt64` as serialized by orchestrator
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NullInt64 {
    #[serde(default)]
    int64: i64,
    #[serde(default)]
    valid: bool,
}

/// Subset of orchestrator's `Instance` document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OrcInstance {
    key: InstanceKey,
    #[serde(default)]
    seconds_behind_master: Option<NullInt64>,
}

impl From<OrcInstance> for Instance {
    fn from(raw: OrcInstance) -> Self {
        let replication_lag = raw
            .seconds_behind_master
            .filter(|lag| lag.valid)
            .map(|lag| lag.int64);
        Instance {
            hostname: raw.key.hostname,
            port: raw.key.port,
            replication_lag,
        }
    }
}

/// Generic `{Code, Message}` API response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiResponse {
    code: String,
    #[serde(default)]
    message: String,
}

/// Client for one orchestrator endpoint
#[derive(Clone, Debug)]
pub struct OrchestratorClient {
    host: String,
    port: u16,
    base_path: String,
    timeout: Duration,
}

impl OrchestratorClient {
    /// Create a client from an address like `http://orchestrator:3000/api`
    pub fn from_uri(uri: &str, request_timeout: Duration) -> Result<Self> {
        let invalid = |reason: &str| TopologyError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let parsed: Uri = uri.trim().parse().map_err(|e: hyper::http::uri::InvalidUri| {
            invalid(&e.to_string())
        })?;

        match parsed.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(invalid(&format!("unsupported scheme {}", other))),
            None => return Err(invalid("missing scheme")),
        }

        let host = parsed
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .to_string();
        let port = parsed.port_u16().unwrap_or(80);
        let base_path = parsed.path().trim_end_matches('/').to_string();

        Ok(Self {
            host,
            port,
            base_path,
            timeout: request_timeout,
        })
    }

    fn path(&self, segments: &[&str]) -> String {
        let mut path = self.base_path.clone();
        for segment in segments {
            path.push('/');
            path.push_str(segment);
        }
        path
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = timeout(self.timeout, self.request(path))
            .await
            .map_err(|_| TopologyError::Timeout)??;

        // Orchestrator reports failures as {"Code":"ERROR","Message":...}
        if let Ok(api) = serde_json::from_slice::<ApiResponse>(&body) {
            if api.code == "ERROR" {
                return Err(TopologyError::Api(api.message));
            }
        }

        serde_json::from_slice(&body).map_err(|e| {
            debug!(
                path = path,
                response = %String::from_utf8_lossy(&body),
                error = %e,
                "Failed to parse orchestrator response"
            );
            TopologyError::JsonError(e)
        })
    }

    async fn request(&self, path: &str) -> Result<Bytes> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| TopologyError::ConnectionError(e.to_string()))?;

        let io = TokioIo::new(stream);

        let (mut sender, conn) = http1::handshake(io)
            .await
            .map_err(|e| TopologyError::HttpError(e.to_string()))?;

        let req = Request::builder()
            .method("GET")
            .uri(path)
            .header("Host", format!("{}:{}", self.host, self.port))
            .header("Accept", "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| TopologyError::HttpError(e.to_string()))?;

        let response = tokio::select! {
            conn_result = conn => {
                if let Err(e) = conn_result {
                    debug!("Connection closed: {}", e);
                }
                return Err(TopologyError::ConnectionError("Connection closed unexpectedly".to_string()));
            }
            response = sender.send_request(req) => {
                response.map_err(|e| TopologyError::HttpError(e.to_string()))?
            }
        };

        let status = response.status();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TopologyError::HttpError(e.to_string()))?
            .to_bytes();

        trace!(path = path, status = status.as_u16(), "Orchestrator response");

        if !status.is_success() {
            // Prefer the API message over the bare status line
            if let Ok(api) = serde_json::from_slice::<ApiResponse>(&body) {
                return Err(TopologyError::Api(api.message));
            }
            return Err(TopologyError::HttpError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl TopologyClient for OrchestratorClient {
    async fn discover(&self, host: &str, port: u16) -> Result<()> {
        let path = self.path(&["discover", host, &port.to_string()]);
        let _: serde_json::Value = self.get(&path).await?;
        Ok(())
    }

    async fn master(&self, cluster_alias: &str) -> Result<Instance> {
        let path = self.path(&["master", cluster_alias]);
        let raw: OrcInstance = self.get(&path).await?;
        Ok(raw.into())
    }

    async fn replicas(&self, cluster_alias: &str) -> Result<Vec<Instance>> {
        let path = self.path(&["cluster-osc-replicas", cluster_alias]);
        let raw: Vec<OrcInstance> = self.get(&path).await?;
        Ok(raw.into_iter().map(Instance::from).collect())
    }
}

/// Connects to orchestrator over HTTP
#[derive(Clone, Debug)]
pub struct OrchestratorConnector {
    timeout: Duration,
}

impl OrchestratorConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            timeout: request_timeout,
        }
    }
}

impl TopologyConnector for OrchestratorConnector {
    fn connect(&self, uri: &str) -> Result<Arc<dyn TopologyClient>> {
        Ok(Arc::new(OrchestratorClient::from_uri(uri, self.timeout)?))
    }
}

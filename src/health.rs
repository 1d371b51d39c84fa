//! Health server for Kubernetes probes and Prometheus metrics
//!
//! Provides HTTP endpoints for:
//! - `/healthz` - Liveness probe (is the process alive?)
//! - `/readyz` - Readiness probe (is the operator ready to serve?)
//! - `/metrics` - Prometheus metrics

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::controller::sync::{SyncError, SyncOutcome, SyncReport};
use crate::crd::ResourceName;

/// Address the health server binds to
pub const HEALTH_ADDR: &str = "0.0.0.0:8080";

/// Labels for metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReconcileLabels {
    pub namespace: String,
    pub name: String,
}

impl prometheus_client::encoding::EncodeLabelSet for ReconcileLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-resource sync outcomes
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SyncLabels {
    pub resource: &'static str,
    pub outcome: &'static str,
}

impl prometheus_client::encoding::EncodeLabelSet for SyncLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("resource", self.resource).encode(encoder.encode_label())?;
        ("outcome", self.outcome).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics state
pub struct Metrics {
    /// Total reconciliations counter
    pub reconciliations_total: Family<ReconcileLabels, Counter>,
    /// Failed reconciliations counter
    pub reconciliation_errors_total: Family<ReconcileLabels, Counter>,
    /// Reconciliation duration histogram
    pub reconcile_duration_seconds: Family<ReconcileLabels, Histogram>,
    /// Outcome of every resource sync
    pub sync_outcomes_total: Family<SyncLabels, Counter>,
    /// Orchestrator registration warnings
    pub registration_warnings_total: Family<ReconcileLabels, Counter>,
    /// Desired members per cluster
    pub cluster_replicas_desired: Family<ReconcileLabels, Gauge>,
    /// Ready members per cluster
    pub cluster_replicas_ready: Family<ReconcileLabels, Gauge>,

    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reconciliations_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "mysql_operator_reconciliations",
            "Total number of reconciliations",
            reconciliations_total.clone(),
        );

        let reconciliation_errors_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "mysql_operator_reconciliation_errors",
            "Total number of reconciliation errors",
            reconciliation_errors_total.clone(),
        );

        let reconcile_duration_seconds =
            Family::<ReconcileLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "mysql_operator_reconcile_duration_seconds",
            "Duration of reconciliation in seconds",
            reconcile_duration_seconds.clone(),
        );

        let sync_outcomes_total = Family::<SyncLabels, Counter>::default();
        registry.register(
            "mysql_operator_sync_outcomes",
            "Outcome of each managed resource sync",
            sync_outcomes_total.clone(),
        );

        let registration_warnings_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "mysql_operator_registration_warnings",
            "Orchestrator registration problems",
            registration_warnings_total.clone(),
        );

        let cluster_replicas_desired = Family::<ReconcileLabels, Gauge>::default();
        registry.register(
            "mysql_operator_cluster_replicas_desired",
            "Desired number of members for each cluster",
            cluster_replicas_desired.clone(),
        );

        let cluster_replicas_ready = Family::<ReconcileLabels, Gauge>::default();
        registry.register(
            "mysql_operator_cluster_replicas_ready",
            "Number of ready members for each cluster",
            cluster_replicas_ready.clone(),
        );

        Self {
            reconciliations_total,
            reconciliation_errors_total,
            reconcile_duration_seconds,
            sync_outcomes_total,
            registration_warnings_total,
            cluster_replicas_desired,
            cluster_replicas_ready,
            registry,
        }
    }

    fn labels(namespace: &str, name: &str) -> ReconcileLabels {
        ReconcileLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Record a successful reconciliation
    pub fn record_reconcile(&self, namespace: &str, name: &str, duration_secs: f64) {
        let labels = Self::labels(namespace, name);
        self.reconciliations_total.get_or_create(&labels).inc();
        self.reconcile_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a failed reconciliation
    pub fn record_error(&self, namespace: &str, name: &str) {
        self.reconciliation_errors_total
            .get_or_create(&Self::labels(namespace, name))
            .inc();
    }

    /// Record the outcome of one resource sync
    pub fn record_sync_outcome(&self, resource: ResourceName, outcome: SyncOutcome) {
        self.sync_outcomes_total
            .get_or_create(&SyncLabels {
                resource: resource.alias(),
                outcome: outcome.as_str(),
            })
            .inc();
    }

    /// Record every outcome and warning of a synchronization run
    pub fn record_sync_report(&self, namespace: &str, name: &str, report: &SyncReport) {
        for (resource, outcome) in &report.outcomes {
            self.record_sync_outcome(*resource, *outcome);
        }
        if !report.warnings.is_empty() {
            self.registration_warnings_total
                .get_or_create(&Self::labels(namespace, name))
                .inc_by(report.warnings.len() as u64);
        }
    }

    /// Count the resource that stopped a synchronization run as failed
    pub fn record_sync_error(&self, error: &SyncError) {
        if let Some(kind) = error.kind() {
            self.record_sync_outcome(kind, SyncOutcome::Failed);
        }
    }

    /// Update cluster member metrics
    pub fn set_cluster_replicas(&self, namespace: &str, name: &str, desired: i64, ready: i64) {
        let labels = Self::labels(namespace, name);
        self.cluster_replicas_desired
            .get_or_create(&labels)
            .set(desired);
        self.cluster_replicas_ready.get_or_create(&labels).set(ready);
    }

    /// Encode metrics to Prometheus text format
    ///
    /// Returns an empty string if encoding fails (should never happen with valid metrics).
    fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the operator is ready (connected to K8s API)
    pub ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
    /// Last successful reconcile timestamp (unix seconds)
    pub last_reconcile: AtomicU64,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
            last_reconcile: AtomicU64::new(0),
        }
    }

    /// Mark the operator as ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the operator is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }

    /// Remember when the last reconciliation succeeded
    pub fn touch_reconcile(&self) {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.last_reconcile.store(now, Ordering::Relaxed);
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until the controller has started.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server until `shutdown` is cancelled
pub async fn run_health_server(
    state: Arc<HealthState>,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = TcpListener::bind(HEALTH_ADDR).await?;
    tracing::info!("Health server listening on {}", HEALTH_ADDR);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use mysql_operator::health::{HealthState, run_health_server};
use mysql_operator::{
    Context, KubeEventSink, KubeResourceSyncer, OperatorOptions, OrchestratorConnector,
    run_controller,
};

/// Grace period for in-flight reconciliations to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mysql_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    info!("Starting mysql-operator");

    let options = Arc::new(OperatorOptions::from_env()?);
    info!(
        mysql_image = %options.mysql_image,
        orchestrator = options.orchestrator_uri.as_deref().unwrap_or("-"),
        "Loaded operator options"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let pod_name = std::env::var("POD_NAME").ok();
    if pod_name.is_none() {
        warn!("POD_NAME not set, events will not name the reporting instance");
    }

    let health_state = Arc::new(HealthState::new());
    let shutdown = CancellationToken::new();

    let health_handle = {
        let health_state = health_state.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, shutdown).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let ctx = Arc::new(Context::new(
        client.clone(),
        options.clone(),
        Arc::new(KubeResourceSyncer::new(client.clone(), options.clone())),
        Arc::new(KubeEventSink::new(client, pod_name)),
        Arc::new(OrchestratorConnector::new(options.orchestrator_timeout)),
        Some(health_state.clone()),
        shutdown.clone(),
    ));

    info!("Watching MysqlCluster resources (apiVersion: mysql.presslabs.org/v1alpha1)");

    let mut controller_handle = tokio::spawn(async move {
        run_controller(ctx, None).await;
    });

    tokio::select! {
        result = &mut controller_handle => {
            if let Err(e) = result {
                error!("Controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            health_state.set_ready(false).await;
            shutdown.cancel();

            // Running reconciliations stop at the next resource boundary
            if tokio::time::timeout(
                Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS),
                &mut controller_handle,
            )
            .await
            .is_err()
            {
                warn!(
                    "Controller did not stop within {}s",
                    SHUTDOWN_GRACE_PERIOD_SECS
                );
            }
        }
    }

    shutdown.cancel();
    info!("Operator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

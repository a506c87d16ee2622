use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use topup_reconciler::api::{self, AppState};
use topup_reconciler::config::AppConfig;
use topup_reconciler::database::account_repository::AccountRepository;
use topup_reconciler::database::payment_repository::PaymentRepository;
use topup_reconciler::database::repository::{AccountStore, PaymentStore};
use topup_reconciler::database::init_pool_from_config;
use topup_reconciler::gateway::{PaymentGateway, SignatureValidator, TopupGatewayClient};
use topup_reconciler::logging::init_tracing;
use topup_reconciler::services::{TopupService, WebhookProcessor};
use topup_reconciler::workers::ReconciliationWorker;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting top-up reconciliation service"
    );

    let pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;

    let payments: Arc<dyn PaymentStore> = Arc::new(PaymentRepository::new(pool.clone()));
    let accounts: Arc<dyn AccountStore> = Arc::new(AccountRepository::new(pool.clone()));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        TopupGatewayClient::from_config(&config.gateway)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let processor = Arc::new(WebhookProcessor::new(
        SignatureValidator::new(config.gateway.webhook_secret.clone()),
        gateway.clone(),
        payments.clone(),
    ));
    let topups = Arc::new(TopupService::new(
        gateway.clone(),
        payments.clone(),
        accounts.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = ReconciliationWorker::new(config.worker.clone(), gateway, payments.clone());
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let state = AppState {
        processor,
        topups,
        accounts,
        pool,
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, "Failed to bind server address");
        e
    })?;

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(shutdown_tx.clone()))
        .await?;

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(std::time::Duration::from_secs(10), worker_handle)
        .await
        .is_err()
    {
        error!("Timed out waiting for reconciliation worker shutdown");
    }

    info!("Server shutdown complete");
    Ok(())
}

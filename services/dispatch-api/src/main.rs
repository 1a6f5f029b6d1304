use anyhow::Context;
use binroute_api::webhooks::{build_client, run_worker};
use binroute_api::{router, AppState, ServiceConfig};
use binroute_core::logging;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Time the webhook worker gets to drain after the server stops
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load().context("loading configuration")?;
    logging::init_with(config.log_format);

    let client = build_client(config.webhooks.request_timeout_ms)
        .context("building webhook client")?;
    let (state, queue) = AppState::new(config).context("initialising dispatch state")?;
    let state = Arc::new(state);
    let worker = tokio::spawn(run_worker(queue, client, state.deliveries.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.port));
    let app = router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "binroute dispatch API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    // Dropping the router released the queue sender; let pending deliveries finish
    if tokio::time::timeout(DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("webhook worker did not drain in time");
    }
    info!("binroute dispatch API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

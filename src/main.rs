use anyhow::{Context, Result};
use facade_sync::api::{create_app, SyncAppState};
use facade_sync::config::load_from_env;
use facade_sync::state::Broadcaster;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facade_sync=info".into()),
        )
        .init();

    info!("Facade sync starting...");

    let config = load_from_env().context("Failed to load configuration")?;
    info!(
        bind = %config.server.bind,
        facades = config.facades.len(),
        queue_capacity = config.session.outbound_queue_capacity,
        heartbeat_ms = config.session.heartbeat_interval_ms,
        publish_auth = config.publish.publish_token.is_some(),
        "Configuration loaded"
    );

    let broadcaster = Arc::new(Broadcaster::new(config.publish.policy.clone()));
    let app = create_app(SyncAppState::from_config(&config, broadcaster));

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Facade sync stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

use anyhow::{Context, Result};
use facade_sync::client::{run_display, LogPlayer, Player, Reconciler};
use facade_sync::config::load_from_env;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facade_sync=info,facade_display=info".into()),
        )
        .init();

    // the reconciler is single-threaded
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    runtime.block_on(run())
}

async fn run() -> Result<()> {
    let config = load_from_env().context("Failed to load configuration")?;
    let display_config = config.display;
    info!(
        facade_id = %display_config.facade_id,
        url = %display_config.facade_url(),
        "Facade display starting..."
    );

    let mut player = LogPlayer::new();
    player.show_waiting();
    let mut reconciler = Reconciler::new(player, Duration::from_millis(display_config.seek_tolerance_ms));

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for shutdown signal");
                // keep the sender alive so the display keeps running
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    run_display(&display_config, &mut reconciler, shutdown_rx).await;

    info!("Facade display stopped");
    Ok(())
}

//! Serve command - run the sync scheduler until interrupted

use anyhow::{Context, Result};
use tally_config::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::App;

/// Run the serve command
pub async fn run(config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "Tally starting"
    );

    let app = App::build(config).await?;
    let scheduler = app.scheduler();
    let cancel = CancellationToken::new();

    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    wait_for_shutdown().await?;
    info!("shutdown signal received, stopping scheduler...");
    cancel.cancel();

    task.await.context("scheduler task panicked")?;
    info!("Tally shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => result.context("failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    Ok(())
}

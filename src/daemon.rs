//! Long-running mode: keep the feed fresh until the process is signalled.

use std::future::Future;
use std::path::PathBuf;

use tracing::info;

use crate::app::{AppContext, Result, SavedFeedError};
use crate::config::{format_interval, Config};

/// Runs until SIGINT or SIGTERM, then shuts everything down in order.
pub async fn run(config: &Config, output: Option<PathBuf>) -> Result<()> {
    run_until(config, output, shutdown_signal()).await
}

/// Runs until `shutdown` resolves.
pub async fn run_until<F>(config: &Config, output: Option<PathBuf>, shutdown: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let interval = config
        .cache
        .interval()
        .map_err(|e| SavedFeedError::Config(e.to_string()))?;
    let ctx = AppContext::start(config, output).await?;

    info!(
        "Daemon started (update interval: {}, PID: {}, {} items)",
        format_interval(interval.as_secs()),
        std::process::id(),
        ctx.feed().len()
    );

    let result = shutdown.await;
    ctx.shutdown().await;
    info!("Daemon stopped");
    result
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    Ok(())
}

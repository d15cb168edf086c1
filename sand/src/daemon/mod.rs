// sand daemon: owns the timer registry and answers clients on an inherited Unix socket
//
// Responsibilities:
// - Adopt the listening socket handed over by the launcher (SAND_SOCKFD)
// - Serve any number of concurrent clients against one registry
// - Exit promptly on SIGTERM/SIGINT, releasing the socket

pub mod channel;
pub mod server;
pub mod session;

use crate::timers::clock::MonotonicClock;
use crate::timers::config::DaemonConfig;
use crate::timers::notify::DesktopNotifier;
use crate::timers::registry::TimerRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Run the daemon to completion. Errors here are startup failures.
pub fn main(config: DaemonConfig) -> Result<()> {
    info!("Starting sand daemon {}", crate::VERSION);

    let rt = Runtime::new().context("Failed to start async runtime")?;
    rt.block_on(run(config))
}

async fn run(config: DaemonConfig) -> Result<()> {
    let listener = channel::adopt_listener(config.listen_fd)
        .context("Failed to adopt listening socket from launcher")?;

    // Install handlers before accepting so an early SIGTERM is not lost
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    };

    let registry = Arc::new(
        TimerRegistry::new(Arc::new(MonotonicClock))
            .with_notifier(Arc::new(DesktopNotifier::from_env())),
    );
    server::serve(listener, Arc::clone(&registry), shutdown).await;

    info!(discarded_timers = registry.len().await, "Daemon stopped");
    Ok(())
}

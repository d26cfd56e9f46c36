use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};

/// Graceful shutdown coordinator for Guildhall.
///
/// Holds a watch channel that flips to `true` once a termination signal
/// arrives. The bot's event loop subscribes and drains in-flight work
/// before exiting.
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Receiver that resolves when shutdown has been requested.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Request shutdown programmatically.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Install signal handlers and flip the channel on SIGINT/SIGTERM.
    pub fn install_signal_handlers(&self) -> Result<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                warn!("Signal handler error: {}", e);
            }
            info!("Termination signal received, initiating graceful shutdown");
            let _ = tx.send(true);
        });
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        assert!(!*rx.borrow());
        coordinator.trigger();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}

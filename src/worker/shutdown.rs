//! SIGINT/SIGTERM to a watch channel

use log::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Receiver side handed to consumers; flips to `true` once
pub type ShutdownSignal = watch::Receiver<bool>;

#[must_use]
pub fn shutdown_channel() -> (watch::Sender<bool>, ShutdownSignal) {
    watch::channel(false)
}

/// Resolve on Ctrl-C, or SIGTERM on Unix
async fn termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {e}");
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received SIGINT");
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
        }
    }
}

/// Flip `tx` to `true` on the first termination signal
pub fn spawn_signal_listener(tx: watch::Sender<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        termination().await;
        // receivers may already be gone if the consumer exited on idle
        let _ = tx.send(true);
    })
}

// Signal handling module
//
// Supported signals:
// - SIGHUP:  Drop cached templates so edits on disk are picked up
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Signal handler state
pub struct SignalHandler {
    /// Shutdown signal (SIGTERM, SIGINT)
    pub shutdown: Arc<Notify>,
    /// Reload signal (SIGHUP)
    pub reload: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
            reload: Arc::new(Notify::new()),
        }
    }

    /// Wake the server loop for shutdown
    pub fn request_shutdown(&self) {
        // notify_one stores a permit if the loop is not waiting yet
        self.shutdown.notify_one();
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Start signal handlers (Unix only)
///
/// | Signal  | Action                 |
/// |---------|------------------------|
/// | SIGHUP  | Clear template cache   |
/// | SIGTERM | Graceful stop          |
/// | SIGINT  | Graceful stop          |
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    logger::log_info(&format!(
        "Signal handlers registered (pid {}): HUP reloads templates, TERM/INT stop",
        std::process::id()
    ));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    logger::log_info("SIGHUP received, clearing template cache");
                    handler.reload.notify_one();
                }
                _ = sigterm.recv() => {
                    logger::log_info("SIGTERM received, shutting down");
                    handler.request_shutdown();
                    break;
                }
                _ = sigint.recv() => {
                    logger::log_info("SIGINT received, shutting down");
                    handler.request_shutdown();
                    break;
                }
            }
        }
    });

    Ok(())
}

/// Non-Unix fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_info("Ctrl+C received, shutting down");
            handler.request_shutdown();
        }
    });
    Ok(())
}

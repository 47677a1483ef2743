// Server loop module
// Accepts connections until shutdown, handling template reloads in between

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config;
use crate::logger;

/// Interval between checks while draining connections on shutdown
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept connections until the shutdown signal fires, then wait for
/// in-flight connections to finish (bounded by the connection timeout).
#[allow(clippy::ignored_unit_patterns)]
pub async fn run_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    signals: Arc<SignalHandler>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = signals.reload.notified() => {
                if state.generator.store().is_caching() {
                    state.generator.store().clear();
                    logger::log_info("Template cache cleared");
                }
            }

            _ = signals.shutdown.notified() => {
                break;
            }
        }
    }

    drop(listener);
    drain_connections(&state, &active_connections).await;
}

/// Wait for active connections to reach zero or the grace period to pass
async fn drain_connections(state: &config::AppState, active_connections: &AtomicUsize) {
    let performance = &state.config.performance;
    let grace = Duration::from_secs(std::cmp::max(
        performance.read_timeout,
        performance.write_timeout,
    ));
    let deadline = tokio::time::Instant::now() + grace;

    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            logger::log_info("All connections closed, server stopped");
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutdown grace period elapsed with {remaining} connection(s) still open"
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

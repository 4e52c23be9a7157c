//! Graceful shutdown trigger shared by every binary.

use tokio::signal;
use tracing::{error, info};

/// Resolve on SIGINT or SIGTERM.
///
/// Passed to `axum::serve(..).with_graceful_shutdown`, so in-flight requests
/// finish before the process exits.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!(target: "common.shutdown", "Received SIGINT, starting graceful shutdown"),
            Err(e) => error!(target: "common.shutdown", error = %e, "Failed to listen for SIGINT"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(target: "common.shutdown", "Received SIGTERM, starting graceful shutdown");
            }
            Err(e) => {
                error!(target: "common.shutdown", error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

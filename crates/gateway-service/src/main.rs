//! Gateway Service
//!
//! Public entry point: edge verification and prefix routing to the
//! downstream services.

use common::observability::{init_tracing, metrics::init_metrics_recorder};
use common::shutdown::shutdown_signal;
use gateway_service::config::Config;
use gateway_service::routes;
use std::net::SocketAddr;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    init_tracing(
        "gateway_service=debug,common=info,tower_http=debug",
        config.log_format,
    )?;

    info!("Starting Gateway Service");
    info!(
        bind_address = %config.bind_address,
        auth_service_url = %config.auth_service_url,
        user_service_url = %config.user_service_url,
        tmdb_service_url = %config.tmdb_service_url,
        public_paths = ?config.public_paths.iter().collect::<Vec<_>>(),
        forward_identity = config.forward_identity,
        upstream_timeout_seconds = config.upstream_timeout.as_secs(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder()?;

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let app = routes::build_routes(&config, metrics_handle)?;

    info!("Gateway Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway Service shutdown complete");

    Ok(())
}

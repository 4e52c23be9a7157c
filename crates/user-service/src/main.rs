//! User Service
//!
//! Serves the authenticated user's profile.

use common::observability::{init_tracing, metrics::init_metrics_recorder};
use common::shutdown::shutdown_signal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use user_service::config::Config;
use user_service::repositories::{InMemoryProfileStore, PgProfileStore, ProfileStore};
use user_service::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    init_tracing("user_service=debug,common=info,tower_http=debug", config.log_format)?;

    info!("Starting User Service");
    info!(bind_address = %config.bind_address, "Configuration loaded successfully");

    let metrics_handle = init_metrics_recorder()?;

    let store: Arc<dyn ProfileStore> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await
                .map_err(|e| {
                    error!("Failed to connect to database: {}", e);
                    e
                })?;
            info!("Database connection established");
            Arc::new(PgProfileStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, profiles are kept in memory and lost on restart");
            Arc::new(InMemoryProfileStore::new())
        }
    };

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState { config, store });
    let app = routes::build_routes(state, metrics_handle);

    info!("User Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("User Service shutdown complete");

    Ok(())
}

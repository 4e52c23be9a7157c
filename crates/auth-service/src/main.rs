//! Auth Service
//!
//! Registers accounts, authenticates them and issues the tokens every other
//! service verifies.

use auth_service::config::Config;
use auth_service::repositories::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};
use auth_service::routes::{self, AppState};
use common::observability::{init_tracing, metrics::init_metrics_recorder};
use common::shutdown::shutdown_signal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    init_tracing("auth_service=debug,common=info,tower_http=debug", config.log_format)?;

    info!("Starting Auth Service");
    info!(
        bind_address = %config.bind_address,
        bcrypt_cost = config.bcrypt_cost,
        token_ttl_seconds = config.jwt.ttl.as_secs(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder()?;

    let store: Arc<dyn CredentialStore> = match &config.database_url {
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
            Arc::new(PgCredentialStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, credentials are kept in memory and lost on restart");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState::new(config, store).map_err(|e| {
        error!("Failed to prepare password hashing: {}", e);
        e
    })?);
    let app = routes::build_routes(state, metrics_handle);

    info!("Auth Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Auth Service shutdown complete");

    Ok(())
}

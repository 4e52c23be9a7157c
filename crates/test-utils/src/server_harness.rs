//! Test server harnesses for E2E testing
//!
//! Each harness runs a service's real router, with an in-memory store where
//! the service has one, on a random local port.

use crate::fixtures::test_vars;
use auth_service::models::NewCredential;
use auth_service::repositories::{CredentialStore, InMemoryCredentialStore};
use axum::Router;
use common::observability::metrics::{detached_metrics_handle, init_metrics_recorder};
use common::secret::SecretString;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use user_service::repositories::{InMemoryProfileStore, ProfileStore};

/// The global recorder can only be installed once per test process; later
/// servers get a detached recorder of their own.
fn metrics_handle() -> PrometheusHandle {
    init_metrics_recorder().unwrap_or_else(|_| detached_metrics_handle())
}

async fn serve(app: Router) -> Result<(SocketAddr, JoinHandle<()>), anyhow::Error> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

    let addr = listener
        .local_addr()
        .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("Test server error: {}", e);
        }
    });

    Ok((addr, handle))
}

fn vars_with(overrides: &[(&str, &str)]) -> HashMap<String, String> {
    let mut vars = test_vars();
    for (name, value) in overrides {
        vars.insert((*name).to_string(), (*value).to_string());
    }
    vars
}

// ============================================================================
// Auth service
// ============================================================================

/// Test harness for the auth service
///
/// # Example
/// ```rust,ignore
/// let auth = TestAuthServer::spawn().await?;
/// auth.seed_account("alice", "alice@example.com", "password123", "ADMIN").await?;
///
/// let response = reqwest::Client::new()
///     .post(format!("{}/auth/login", auth.url()))
///     .json(&json!({"username": "alice", "password": "password123"}))
///     .send()
///     .await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    state: Arc<auth_service::routes::AppState>,
    store: Arc<InMemoryCredentialStore>,
    _handle: JoinHandle<()>,
}

impl TestAuthServer {
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(&[]).await
    }

    /// Spawn with extra environment variables layered over the test defaults.
    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let config = auth_service::config::Config::from_vars(&vars_with(overrides))?;
        let store = Arc::new(InMemoryCredentialStore::new());
        let state = Arc::new(auth_service::routes::AppState::new(
            config,
            store.clone() as Arc<dyn CredentialStore>,
        )?);

        let app = auth_service::routes::build_routes(state.clone(), metrics_handle());
        let (addr, handle) = serve(app).await?;

        Ok(Self {
            addr,
            state,
            store,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &auth_service::config::Config {
        &self.state.config
    }

    /// The state the running router was built from.
    pub fn state(&self) -> Arc<auth_service::routes::AppState> {
        self.state.clone()
    }

    pub fn store(&self) -> &InMemoryCredentialStore {
        &self.store
    }

    /// Insert an account directly, with any role. Registration only ever
    /// creates `USER` accounts.
    pub async fn seed_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<(), anyhow::Error> {
        let password_hash = self
            .state
            .passwords
            .hash(SecretString::from(password.to_string()))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to hash seed password: {}", e))?;

        self.store
            .insert(NewCredential {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role: role.to_string(),
            })
            .await?;
        Ok(())
    }
}

// ============================================================================
// User service
// ============================================================================

pub struct TestUserServer {
    addr: SocketAddr,
    store: Arc<InMemoryProfileStore>,
    _handle: JoinHandle<()>,
}

impl TestUserServer {
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let config = user_service::config::Config::from_vars(&test_vars())?;
        let store = Arc::new(InMemoryProfileStore::new());
        let state = Arc::new(user_service::routes::AppState {
            config,
            store: store.clone() as Arc<dyn ProfileStore>,
        });

        let app = user_service::routes::build_routes(state, metrics_handle());
        let (addr, handle) = serve(app).await?;

        Ok(Self {
            addr,
            store,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn store(&self) -> &InMemoryProfileStore {
        &self.store
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Test harness for the gateway
///
/// Upstream URLs are passed as overrides, typically the URLs of other
/// harnesses or of `wiremock` servers:
///
/// ```rust,ignore
/// let gateway = TestGateway::spawn_with(&[
///     ("AUTH_SERVICE_URL", &auth.url()),
///     ("USER_SERVICE_URL", &users.url()),
/// ]).await?;
/// ```
pub struct TestGateway {
    addr: SocketAddr,
    config: gateway_service::config::Config,
    _handle: JoinHandle<()>,
}

impl TestGateway {
    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let config = gateway_service::config::Config::from_vars(&vars_with(overrides))?;
        let app = gateway_service::routes::build_routes(&config, metrics_handle())?;
        let (addr, handle) = serve(app).await?;

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> &gateway_service::config::Config {
        &self.config
    }
}

/// Gateway, auth service and user service wired together, the way clients
/// see the platform. The tmdb upstream points at a closed port.
pub struct TestPlatform {
    pub auth: TestAuthServer,
    pub users: TestUserServer,
    pub gateway: TestGateway,
}

impl TestPlatform {
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let auth = TestAuthServer::spawn().await?;
        let users = TestUserServer::spawn().await?;
        let gateway = TestGateway::spawn_with(&[
            ("AUTH_SERVICE_URL", &auth.url()),
            ("USER_SERVICE_URL", &users.url()),
            ("TMDB_SERVICE_URL", "http://127.0.0.1:9"),
            ("UPSTREAM_TIMEOUT_SECONDS", "5"),
        ])
        .await?;

        Ok(Self {
            auth,
            users,
            gateway,
        })
    }

    pub fn url(&self) -> String {
        self.gateway.url()
    }
}

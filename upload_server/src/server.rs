//! HTTP server wrapping the session orchestrator.
//!
//! The backend is injected once at construction and shared by every request;
//! the server owns nothing durable itself. `run_until_stopped` exists so
//! tests can drive the full HTTP surface with programmatic shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use storage_backend::MultipartBackend;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::auth::AuthSettings;
use crate::error::{Result, ServerError};
use crate::handlers::{self, ServerState};
use crate::orchestrator::Orchestrator;

/// Largest accepted chunk body. Keeps a misbehaving client from buffering
/// arbitrary amounts of memory server-side.
const MAX_CHUNK_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Configuration for the upload server.
#[derive(Debug, Clone)]
pub struct UploadServerConfig {
    /// Network interface to bind to (e.g., "127.0.0.1" or "0.0.0.0").
    pub host: String,
    /// TCP port number for the HTTP server.
    pub port: u16,
    /// Static API key exchanged for bearer tokens at /auth/token.
    pub api_key: String,
    /// Secret signing the bearer tokens.
    pub token_secret: String,
    /// Lifetime of issued bearer tokens.
    pub token_ttl: Duration,
    /// Idle time after which an upload session is swept and its backend
    /// multipart upload aborted.
    pub session_ttl: Duration,
    /// How often the expiry sweep runs.
    pub sweep_period: Duration,
}

impl Default for UploadServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: "default-dev-key".to_string(),
            token_secret: "default-dev-secret".to_string(),
            token_ttl: Duration::from_secs(3600),
            session_ttl: Duration::from_secs(3600),
            sweep_period: Duration::from_secs(60),
        }
    }
}

/// The upload-session coordinator behind an Axum HTTP surface.
pub struct UploadServer {
    config: UploadServerConfig,
    orchestrator: Arc<Orchestrator>,
    auth: Arc<AuthSettings>,
}

impl UploadServer {
    pub fn new(config: UploadServerConfig, backend: Arc<dyn MultipartBackend>) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(backend, config.session_ttl));
        let auth = Arc::new(AuthSettings::new(&config.api_key, &config.token_secret, config.token_ttl));
        Self {
            config,
            orchestrator,
            auth,
        }
    }

    /// The orchestrator behind the HTTP surface; tests use this to inspect
    /// session state directly.
    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.orchestrator.clone()
    }

    /// The server's bind address as "host:port".
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Builds the router: a public token/health surface plus the bearer-gated
    /// upload operations under /v1.
    fn create_router(&self) -> Router {
        let state = ServerState {
            orchestrator: self.orchestrator.clone(),
            auth: self.auth.clone(),
        };

        let uploads = Router::new()
            .route("/uploads", post(handlers::start_upload))
            .route("/uploads/{upload_id}/parts/{chunk_number}", post(handlers::upload_chunk))
            .route("/uploads/{upload_id}/complete", post(handlers::complete_upload))
            .route("/uploads/{upload_id}", delete(handlers::abort_upload))
            .layer(axum::middleware::from_fn_with_state(state.clone(), handlers::require_bearer));

        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/auth/token", post(handlers::issue_token))
            .nest("/v1", uploads)
            .layer(DefaultBodyLimit::max(MAX_CHUNK_BODY_BYTES))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Runs the server until the process is terminated.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_on(listener, std::future::pending::<()>()).await
    }

    /// Runs the server until a message arrives on `shutdown_rx`; used by
    /// tests for programmatic lifecycle control.
    pub async fn run_until_stopped(&self, shutdown_rx: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_on(listener, async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Binds the configured address. Exposed so tests can bind port 0 and
    /// read the assigned port before serving.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = self
            .addr()
            .parse()
            .map_err(|e| ServerError::Configuration(format!("invalid listen address {}: {e}", self.addr())))?;
        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Configuration(format!("failed to bind {addr}: {e}")))
    }

    /// Serves requests on `listener` until `shutdown` resolves. The expiry
    /// sweep runs alongside and stops with the server.
    pub async fn serve_on(
        &self,
        listener: TcpListener,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("upload server listening on {addr}");
        }

        let sweep = self.orchestrator.spawn_expiry_sweep(self.config.sweep_period);
        let router = self.create_router();

        let result = axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(anyhow::anyhow!("server error: {e}")));

        sweep.abort();
        result
    }
}

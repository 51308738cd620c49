//! Chunked-upload server binary.
//!
//! Exposes the multipart-session API (`/auth/token`, `/v1/uploads/...`,
//! `/health`) over HTTP, backed by either an in-memory store or a local
//! disk store.
//!
//! ```bash
//! # Default settings (port 8080, data in ./upload_data)
//! upload_server
//!
//! # Custom storage directory and port
//! upload_server --data-directory /var/lib/uploads --port 9000
//!
//! # Ephemeral in-memory storage
//! upload_server --in-memory
//! ```
//!
//! Logging verbosity is controlled via `RUST_LOG` (e.g. `RUST_LOG=debug`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use storage_backend::{DiskBackend, MemoryBackend, MultipartBackend};
use tracing_subscriber::EnvFilter;
use upload_server::{UploadServer, UploadServerConfig};

/// HTTP server coordinating resumable chunked uploads into an object store.
#[derive(Parser, Debug)]
#[command(name = "upload_server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Network interface to bind the server to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// TCP port number for the HTTP server.
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Directory where staged parts and finalized objects are stored.
    /// Created if it doesn't exist. Ignored when --in-memory is set.
    #[arg(short, long, default_value = "./upload_data")]
    data_directory: PathBuf,

    /// Use in-memory storage instead of disk-backed storage. All data is
    /// lost when the server stops.
    #[arg(long, default_value = "false")]
    in_memory: bool,

    /// API key clients exchange for short-lived upload tokens.
    #[arg(long, env = "UPLOAD_API_KEY", default_value = "default-dev-key")]
    api_key: String,

    /// Secret used to sign upload tokens.
    #[arg(long, env = "UPLOAD_TOKEN_SECRET", default_value = "default-dev-secret")]
    token_secret: String,

    /// Seconds an idle upload session survives before being swept and its
    /// backend multipart upload aborted.
    #[arg(long, default_value = "3600")]
    session_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let backend: Arc<dyn MultipartBackend> = if args.in_memory {
        tracing::info!("storage mode: in-memory");
        Arc::new(MemoryBackend::new())
    } else {
        tracing::info!("storage mode: disk-backed at {:?}", args.data_directory);
        Arc::new(DiskBackend::new(&args.data_directory)?)
    };

    let config = UploadServerConfig {
        host: args.host,
        port: args.port,
        api_key: args.api_key,
        token_secret: args.token_secret,
        session_ttl: Duration::from_secs(args.session_ttl_secs),
        ..Default::default()
    };

    let server = UploadServer::new(config, backend);
    server.run().await?;

    Ok(())
}

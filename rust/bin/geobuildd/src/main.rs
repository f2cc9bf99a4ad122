//! `geobuildd`: the GeoBuild back-office server binary.
//!
//! Usage:
//!   geobuildd -c <path/to/geobuild.toml> [--listen <addr>]

mod auth_middleware;
mod bootstrap;
mod config;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use config::ServerConfig;

/// GeoBuild back-office server.
#[derive(Parser, Debug)]
#[command(name = "geobuildd", about = "GeoBuild back-office server")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: PathBuf,

    /// Listen address (overrides `[server] listen`).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    info!("Loading configuration from {}", cli.config.display());
    let server_config = ServerConfig::load(&cli.config)?;
    bootstrap::verify_config(&server_config)?;

    let service_config = server_config.service_config(cli.listen.as_deref());
    bootstrap::prepare_storage(&service_config)?;

    // Embedded stores, shared by all modules.
    let sql: Arc<dyn geobuild_sql::SQLStore> = Arc::new(
        geobuild_sql::SqliteStore::open(&service_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    let blobs: Arc<dyn geobuild_blob::BlobStore> = Arc::new(
        geobuild_blob::FileStore::open(&service_config.resolve_upload_dir())
            .map_err(|e| anyhow::anyhow!("failed to open upload store: {}", e))?,
    );

    let app = routes::build_app(&server_config, sql, blobs)?;

    let listener = tokio::net::TcpListener::bind(&service_config.listen).await?;
    info!("GeoBuild server listening on {}", service_config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

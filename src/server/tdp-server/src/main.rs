//! TDP Server - Main entry point.

mod config;

use anyhow::Context;
use clap::Parser;
use tdp_api::AppState;
use tdp_auth::OidcClient;
use tdp_storage_sqlite::SqliteBackend;
use tdp_users::UserDirectory;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting TDP server...");
    info!("Bind address: {}", config.bind);

    if config.dev_header_auth {
        tracing::warn!("X-Username header authentication enabled - DO NOT USE IN PRODUCTION");
    }

    let backend = SqliteBackend::open(&config.data_dir, &config.database)
        .await
        .context("failed to open database")?;
    let directory = UserDirectory::new(backend).await?;
    let oidc = OidcClient::new(config.oidc(), &config.jwt_key).context("invalid OIDC settings")?;

    let app = tdp_api::router(AppState::new(directory, oidc, config.api()));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("TDP server listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

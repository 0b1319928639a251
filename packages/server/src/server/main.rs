// Main entry point for the pairing server

use std::sync::Arc;

use anyhow::{Context, Result};
use pair_core::domains::pairing::WorkspaceRoot;
use pair_core::kernel::{GatewayAdapter, ServerDeps};
use pair_core::{server::build_app, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wa_gateway::{GatewayOptions, GatewayService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pair_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pairing server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Prepare the workspace root; leftovers belong to sessions of a previous run
    let workspaces = WorkspaceRoot::new(&config.session_root);
    workspaces
        .ensure()
        .with_context(|| format!("Failed to create {}", config.session_root.display()))?;
    let purged = workspaces
        .purge_stale()
        .context("Failed to purge stale session workspaces")?;
    if purged > 0 {
        tracing::warn!(purged, "Removed stale session workspaces");
    }

    let gateway = Arc::new(GatewayService::new(GatewayOptions {
        base_url: config.gateway_url.clone(),
        api_key: config.gateway_api_key.clone(),
    }));

    let deps = ServerDeps::new(
        Arc::new(GatewayAdapter::new(gateway)),
        workspaces,
        config.pairing_settings(),
    );
    let app = build_app(deps);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

use std::net::SocketAddr;

use anyhow::Context;
use onboarding_flow::config::{ServiceConfig, StorageConfig};
use onboarding_flow::server::build_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;

    let storage = match &config.storage {
        StorageConfig::Local { path } => path.display().to_string(),
        StorageConfig::Remote { url, .. } => url.clone(),
        StorageConfig::Memory => ":memory:".to_string(),
    };
    eprintln!("Onboarding Flow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Storage: {storage}");
    eprintln!("   Wizard API: http://0.0.0.0:{}/api/onboarding/sessions", config.port);
    eprintln!("   Admin API: http://0.0.0.0:{}/api/admin/components", config.port);
    eprintln!("   Records API: http://0.0.0.0:{}/api/userdata\n", config.port);

    let app = build_app(&config)
        .await
        .context("Failed to initialise the service")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(port = config.port, "Onboarding server started");

    axum::serve(listener, app).await?;
    Ok(())
}

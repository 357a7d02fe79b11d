mod config;
mod middleware;
mod routes;
mod shutdown;
mod state;
mod telemetry;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    let config = config::Config::load().context("Failed to load configuration")?;

    telemetry::init_telemetry(config.production);

    tracing::info!("Starting Stream Relay...");
    tracing::info!("Production mode: {}", config.production);

    let app_state = state::AppState::new(config.clone())
        .context("Failed to initialize application state")?;

    let app = routes::build_router(app_state);

    let addr = SocketAddr::from((
        config
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid server host")?,
        config.port,
    ));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Manifest: http://{}/manifest.json", addr);
    tracing::info!("Configure: http://{}/configure", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown::shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

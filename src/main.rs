use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use outfit_stylist::{
    gemini::GeminiClient,
    routes::{build_router, AppState},
    Config, DemoBackend, GenerativeBackend, ModelSettings, Stylist,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("invalid configuration")?;

    let backend: Arc<dyn GenerativeBackend> = if config.demo_mode() {
        tracing::warn!("GEMINI_API_KEY not set, running in demo mode");
        Arc::new(DemoBackend)
    } else {
        let api_key = config.api_key.clone().unwrap_or_default();
        tracing::info!("Using API key: {}...", api_key.chars().take(10).collect::<String>());
        let client = GeminiClient::new(api_key, config.api_base.clone(), config.model_timeout)
            .context("failed to build Gemini client")?;
        Arc::new(client)
    };

    let state = AppState {
        stylist: Arc::new(Stylist::new(backend, ModelSettings::from(&config))),
        max_upload_bytes: config.max_upload_bytes,
    };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

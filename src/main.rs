use std::env;

use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use toolgate::{app, build_state, logging, AppConfig, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Resolve configuration before installing the subscriber so the console
    // renderer (JSON vs plain text) follows USE_JSON_ONLY.
    let config = AppConfig::from_env()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.use_json_only {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    // Build application state; the registry and log sinks are fixed from
    // here on.  The global logger slot makes re-initialization a no-op.
    let state = build_state(config)?;
    let logger = logging::init(state.logger.clone());
    logger.emit(
        Level::Info,
        "startup",
        "tool gateway initialized",
        json!({
            "functions": state.registry.len(),
            "registered": state.registry.names(),
        }),
    );

    // Determine port to bind on. Default to 8000 if unspecified.
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8000);
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();

    // Run the server with graceful shutdown on Ctrl+C
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

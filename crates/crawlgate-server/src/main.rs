use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crawlgate_server::config::ServerConfig;
use crawlgate_server::routes;
use crawlgate_server::state::AppState;

#[cfg(feature = "browser")]
type Engine = crawlgate_client::ChromiumEngine;
#[cfg(not(feature = "browser"))]
type Engine = crawlgate_client::HttpEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("crawlgate=info".parse()?))
        .with_target(false)
        .init();

    let config = ServerConfig::parse();
    config.validate()?;

    let mut engine = Engine::new();
    if config.allow_private_urls {
        tracing::warn!("SSRF protection disabled: private and loopback targets are allowed");
        engine = engine.allow_private_urls();
    }

    let state = Arc::new(AppState::new(engine, config.api_token.clone()));

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr();
    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

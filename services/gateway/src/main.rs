mod app;
mod auth;
mod config;
mod error;
mod handlers;
mod models;
mod rate_limit;
mod router;
mod sessions;
mod state;

use config::GatewayConfig;
use router::create_router;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GatewayConfig::from_env()?;
    let bind = config.bind;
    tracing::info!("Starting arena gateway");

    let arena = app::start(config).await?;
    let app = create_router(arena.state);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!("Listening on {}", bind);
    axum::serve(listener, app).await?;

    for task in arena.tasks {
        task.abort();
    }
    Ok(())
}

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parley_server::config::Config;
use parley_server::context::AppContext;
use parley_server::notify::SessionRegistry;
use parley_server::run_server;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting parley-server");

    let sessions = Arc::new(SessionRegistry::new());
    let ctx = Arc::new(AppContext::new(config.clone(), sessions.clone()));

    let listener = TcpListener::bind(config.bind_addr()).await?;
    run_server(listener, ctx, sessions).await
}

use anyhow::Result;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

pub mod config;
pub mod context;
pub mod error;
pub mod governance;
pub mod membership;
pub mod messages;
pub mod model;
pub mod notify;
pub mod routes;
pub mod unread;

use context::AppContext;
use notify::SessionRegistry;

/// Serves the engine on an already-bound listener until Ctrl-C.
pub async fn run_server(
    listener: TcpListener,
    ctx: Arc<AppContext>,
    sessions: Arc<SessionRegistry>,
) -> Result<()> {
    let app = routes::create_router(ctx, sessions);

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

//! Listener setup and graceful shutdown.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use sharehub_common::Result;
use sharehub_share::ShareService;

use crate::log_level::LogLevel;
use crate::routes::router;
use crate::AppState;

/// Listener and access settings.
#[derive(Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub api_key: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("addr", &self.addr)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Serve the API until Ctrl-C.
///
/// With `log_level`, `PUT /log/{level}` changes the filter at runtime.
///
/// # Errors
/// - The address cannot be bound
pub async fn run(
    config: ServerConfig,
    service: ShareService,
    log_level: Option<LogLevel>,
) -> Result<()> {
    let mut state = AppState::new(service, config.api_key.as_str());
    if let Some(log_level) = log_level {
        state = state.with_log_level(log_level);
    }
    let listener = TcpListener::bind(config.addr).await?;

    info!(addr = %config.addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

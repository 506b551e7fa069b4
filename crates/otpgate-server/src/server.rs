use std::time::Duration;

use crate::manager::ConnectionManager;
use crate::routes::{build_router, AppState};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub api_key: String,
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            api_key: "change-me".to_string(),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Handle returned by `start()`; keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _sweep: tokio::task::JoinHandle<()>,
}

/// Bind the listener, spawn the health sweep, and serve.
pub async fn start(
    config: ServerConfig,
    manager: ConnectionManager,
) -> Result<ServerHandle, std::io::Error> {
    let sweep = manager.spawn_health_sweep(config.sweep_interval);

    let state = AppState {
        manager,
        api_key: config.api_key.into(),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "otpgate server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
        _sweep: sweep,
    })
}

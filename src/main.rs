use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use otpgate_server::{ConnectionManager, ReconnectDelays, ServerConfig};
use otpgate_session::mock::MockConnector;
use otpgate_store::{AuthStore, StateStore};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting otpgate server");

    let port: u16 = std::env::var("OTPGATE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let api_key =
        std::env::var("OTPGATE_API_KEY").expect("OTPGATE_API_KEY must be set");
    let data_dir = std::env::var("OTPGATE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));
    let sweep_secs: u64 = std::env::var("OTPGATE_SWEEP_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    std::fs::create_dir_all(&data_dir).expect("Failed to create data directory");
    tracing::info!(dir = %data_dir.display(), "data directory ready");

    let store = StateStore::new(data_dir.join("connection_state.json"));
    let auth = AuthStore::new(data_dir.join("auth"));

    // A real protocol client plugs in behind SessionConnector; the bundled
    // mock issues a QR per attempt and idles.
    let connector = Arc::new(MockConnector::auto());

    let manager = ConnectionManager::new(connector, store, auth, ReconnectDelays::default());
    let _ = manager.start_connect();

    let config = ServerConfig {
        port,
        api_key,
        sweep_interval: Duration::from_secs(sweep_secs),
    };
    let _handle = otpgate_server::start(config, manager.clone())
        .await
        .expect("Failed to start server");

    tracing::info!(port, "otpgate ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
    manager.shutdown().await;
}

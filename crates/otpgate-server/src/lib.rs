pub mod manager;
pub mod routes;
pub mod server;

pub use manager::{ConnectionManager, ConnectionState, ReconnectDelays, StatusSnapshot};
pub use routes::{build_router, AppState};
pub use server::{start, ServerConfig, ServerHandle};

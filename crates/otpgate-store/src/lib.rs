pub mod auth;
pub mod state;

pub use auth::AuthStore;
pub use state::StateStore;

/// Persistence-layer errors. Reads never produce these; only writes and
/// destructive operations can fail.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
}

//! The two traits a real protocol client implements.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::events::SessionEvent;

/// Acknowledgement for an accepted outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: String,
}

/// Result of asking the network whether a number is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLookup {
    pub exists: bool,
    pub jid: Option<String>,
}

/// A freshly opened session attempt: the live handle plus the event stream
/// the library emits for it, in order.
pub struct NewSession {
    pub handle: Arc<dyn SessionHandle>,
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Factory for session attempts. Each call opens a new session object; the
/// previous one is simply dropped by the caller when superseded.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, auth_dir: &Path) -> Result<NewSession, SessionError>;
}

/// A live session object.
///
/// `identity` is the ground truth used by the liveness verifier: a present
/// identity proves the handle is authenticated right now; an absent one
/// proves nothing on its own.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn identity(&self) -> Option<String>;

    async fn send_text(&self, jid: &str, body: &str) -> Result<SentMessage, SessionError>;

    async fn exists_on_network(&self, number: &str) -> Result<NumberLookup, SessionError>;

    async fn logout(&self) -> Result<(), SessionError>;
}

//! In-process mock of the protocol client.
//!
//! Two modes:
//! - `auto`: each connect attempt issues a fresh QR nonce and then idles.
//!   Used by the binary so the HTTP surface is fully exercisable without a
//!   real client.
//! - `manual`: each connect attempt hands its event sender and handle to
//!   the test through a channel, so tests script arbitrary interleavings.
//!   Dropping the control receiver makes later connects fail, which is how
//!   tests drive the connect-failure transition.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use otpgate_core::phone;

use crate::connector::{NewSession, NumberLookup, SentMessage, SessionConnector, SessionHandle};
use crate::error::SessionError;
use crate::events::SessionEvent;

/// Scriptable session handle.
#[derive(Default)]
pub struct MockHandle {
    identity: Mutex<Option<String>>,
    fail_sends: AtomicBool,
    fail_logout: AtomicBool,
    logged_out: AtomicBool,
    sent: Mutex<Vec<(String, String)>>,
    unknown_numbers: Mutex<HashSet<String>>,
}

impl MockHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_identity(&self, identity: Option<&str>) {
        *self.identity.lock().unwrap() = identity.map(String::from);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::Relaxed);
    }

    /// Mark a number as not registered on the network.
    pub fn mark_unknown(&self, number: &str) {
        let _ = self
            .unknown_numbers
            .lock()
            .unwrap()
            .insert(phone::normalize(number));
    }

    pub fn was_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::Relaxed)
    }

    /// Messages accepted so far, as `(jid, body)` pairs.
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionHandle for MockHandle {
    async fn identity(&self) -> Option<String> {
        self.identity.lock().unwrap().clone()
    }

    async fn send_text(&self, jid: &str, body: &str) -> Result<SentMessage, SessionError> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(SessionError::Send("simulated send failure".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((jid.to_string(), body.to_string()));
        Ok(SentMessage {
            message_id: uuid::Uuid::now_v7().to_string(),
        })
    }

    async fn exists_on_network(&self, number: &str) -> Result<NumberLookup, SessionError> {
        let digits = phone::normalize(number);
        if self.unknown_numbers.lock().unwrap().contains(&digits) {
            return Ok(NumberLookup {
                exists: false,
                jid: None,
            });
        }
        Ok(NumberLookup {
            exists: true,
            jid: Some(phone::to_jid(number)),
        })
    }

    async fn logout(&self) -> Result<(), SessionError> {
        if self.fail_logout.load(Ordering::Relaxed) {
            return Err(SessionError::Logout("simulated logout failure".into()));
        }
        self.logged_out.store(true, Ordering::Relaxed);
        self.set_identity(None);
        Ok(())
    }
}

/// What a manual-mode test receives for each connect attempt.
pub struct SessionControl {
    pub events: mpsc::Sender<SessionEvent>,
    pub handle: Arc<MockHandle>,
}

impl SessionControl {
    /// Inject one event into this attempt's stream.
    pub async fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event).await;
    }

    /// Make the handle live as `identity` and emit the open event.
    pub async fn open_as(&self, identity: &str) {
        self.handle.set_identity(Some(identity));
        self.emit(SessionEvent::Open {
            identity: identity.to_string(),
            device_id: None,
        })
        .await;
    }
}

/// Mock connector; see module docs for the two modes.
pub struct MockConnector {
    control_tx: Option<mpsc::UnboundedSender<SessionControl>>,
    attempts: AtomicU64,
}

impl MockConnector {
    /// QR-then-idle mode for running the binary.
    pub fn auto() -> Self {
        Self {
            control_tx: None,
            attempts: AtomicU64::new(0),
        }
    }

    /// Scripted mode: the returned receiver yields one [`SessionControl`]
    /// per connect attempt, in order.
    pub fn manual() -> (Self, mpsc::UnboundedReceiver<SessionControl>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                control_tx: Some(tx),
                attempts: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Number of connect attempts seen so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(&self, _auth_dir: &Path) -> Result<NewSession, SessionError> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let (events_tx, events) = mpsc::channel(32);
        let handle = Arc::new(MockHandle::new());

        match &self.control_tx {
            Some(control) => {
                control
                    .send(SessionControl {
                        events: events_tx,
                        handle: Arc::clone(&handle),
                    })
                    .map_err(|_| SessionError::Connect("mock controller dropped".into()))?;
            }
            None => {
                let _ = events_tx.try_send(SessionEvent::QrIssued(format!("mock-qr-{attempt}")));
            }
        }

        Ok(NewSession { handle, events })
    }
}

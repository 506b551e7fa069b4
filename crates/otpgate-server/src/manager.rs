//! Connection lifecycle manager.
//!
//! The single authority over the connection record and the pending QR. It
//! consumes the session library's event stream, persists every transition,
//! and owns the reconnection loop. Each session attempt carries a generation
//! tag; events and scheduled reconnects from a superseded generation are
//! dropped, so a late callback from an abandoned handle can never resurrect
//! old state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use otpgate_core::ConnectionRecord;
use otpgate_session::{
    DisconnectCode, SessionConnector, SessionError, SessionEvent, SessionHandle,
};
use otpgate_store::{AuthStore, StateStore};

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingQrScan,
    Connected,
    AuthInvalid,
}

/// Fixed reconnection delays. Finite, never zero-tightened: every retry is a
/// scheduled task, never a synchronous loop.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectDelays {
    /// After credentials were invalidated and cleared (a fresh QR needs a
    /// fresh attempt).
    pub auth_reset: Duration,
    /// After a transient close.
    pub transient_close: Duration,
    /// After a connect attempt itself failed.
    pub connect_failure: Duration,
    /// After an operator-requested restart.
    pub operator_restart: Duration,
}

impl Default for ReconnectDelays {
    fn default() -> Self {
        Self {
            auth_reset: Duration::from_secs(2),
            transient_close: Duration::from_secs(3),
            connect_failure: Duration::from_secs(5),
            operator_restart: Duration::from_secs(1),
        }
    }
}

/// Point-in-time view served by `GET /status`.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub record: ConnectionRecord,
    pub has_qr: bool,
    pub socket_active: bool,
    pub real_time_connected: bool,
}

struct Shared {
    state: ConnectionState,
    record: ConnectionRecord,
    pending_qr: Option<String>,
    handle: Option<Arc<dyn SessionHandle>>,
}

struct ManagerInner {
    connector: Arc<dyn SessionConnector>,
    store: StateStore,
    auth: AuthStore,
    delays: ReconnectDelays,
    generation: AtomicU64,
    shared: Mutex<Shared>,
}

/// Cheap-to-clone handle; all clones drive the same state machine.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Build the manager, loading the last persisted record. A record that
    /// still claims connected from before a crash is kept as-is; the health
    /// sweep and the status gate never trust it without a live handle.
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        store: StateStore,
        auth: AuthStore,
        delays: ReconnectDelays,
    ) -> Self {
        let record = store.load();
        Self {
            inner: Arc::new(ManagerInner {
                connector,
                store,
                auth,
                delays,
                generation: AtomicU64::new(0),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    record,
                    pending_qr: None,
                    handle: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Snapshot of the persisted record.
    pub fn record(&self) -> ConnectionRecord {
        self.inner.shared.lock().record.clone()
    }

    pub fn pending_qr(&self) -> Option<String> {
        self.inner.shared.lock().pending_qr.clone()
    }

    /// Whether a live session handle currently exists.
    pub fn socket_active(&self) -> bool {
        self.inner.shared.lock().handle.is_some()
    }

    pub fn auth(&self) -> &AuthStore {
        &self.inner.auth
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn handle_snapshot(&self) -> Option<Arc<dyn SessionHandle>> {
        self.inner.shared.lock().handle.clone()
    }

    /// Open a new session attempt, superseding any in-flight one.
    ///
    /// Returns the new attempt's generation. The old handle is dropped here;
    /// its late events fail the generation check and are ignored.
    pub fn start_connect(&self) -> u64 {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut shared = self.inner.shared.lock();
            shared.state = ConnectionState::Connecting;
            shared.pending_qr = None;
            shared.handle = None;
        }
        info!(generation, "starting connection attempt");

        let manager = self.clone();
        let _ = tokio::spawn(async move {
            manager.run_attempt(generation).await;
        });
        generation
    }

    async fn run_attempt(&self, generation: u64) {
        let session = match self.inner.connector.connect(self.inner.auth.dir()).await {
            Ok(session) => session,
            Err(e) => {
                warn!(generation, error = %e, "connection attempt failed");
                self.on_connect_failure(generation);
                return;
            }
        };

        {
            let mut shared = self.inner.shared.lock();
            if self.generation() != generation {
                debug!(generation, "attempt superseded before handle install");
                return;
            }
            shared.handle = Some(Arc::clone(&session.handle));
        }

        let mut events = session.events;
        while let Some(event) = events.recv().await {
            let closed = matches!(event, SessionEvent::Closed(_));
            self.handle_event(generation, event);
            if closed || self.generation() != generation {
                break;
            }
        }
    }

    /// Single entry point for every lifecycle event. Events tagged with a
    /// superseded generation are dropped.
    pub fn handle_event(&self, generation: u64, event: SessionEvent) {
        if self.generation() != generation {
            debug!(generation, ?event, "event from superseded session ignored");
            return;
        }

        match event {
            SessionEvent::QrIssued(code) => {
                let mut shared = self.inner.shared.lock();
                if !matches!(
                    shared.state,
                    ConnectionState::Connecting | ConnectionState::AwaitingQrScan
                ) {
                    debug!(generation, state = ?shared.state, "QR event ignored in this state");
                    return;
                }
                shared.state = ConnectionState::AwaitingQrScan;
                shared.pending_qr = Some(code);
                info!(generation, "authentication challenge issued");
            }
            SessionEvent::Open {
                identity,
                device_id,
            } => {
                let mut shared = self.inner.shared.lock();
                shared.state = ConnectionState::Connected;
                shared.pending_qr = None;
                shared.record.mark_connected(&identity, device_id.as_deref());
                self.persist(&shared.record);
                info!(generation, identity = %identity, "connection established");
            }
            SessionEvent::Closed(code) => self.on_closed(generation, code),
            SessionEvent::CredsUpdated => {
                debug!(generation, "credential bundle updated by connector");
            }
        }
    }

    fn on_closed(&self, generation: u64, code: DisconnectCode) {
        warn!(generation, ?code, "connection closed");
        {
            let mut shared = self.inner.shared.lock();
            shared.pending_qr = None;
            shared.handle = None;
            if code.invalidates_auth() {
                // Only rejected credentials justify destroying the bundle.
                shared.state = ConnectionState::AuthInvalid;
                shared.record.reset();
                if let Err(e) = self.inner.auth.clear() {
                    error!(error = %e, "failed to clear credential bundle");
                }
            } else {
                shared.state = ConnectionState::Disconnected;
                shared.record.mark_disconnected();
            }
            self.persist(&shared.record);
        }

        if code.invalidates_auth() {
            self.schedule_reconnect(generation, self.inner.delays.auth_reset, "auth invalidated");
        } else if code.should_reconnect() {
            self.schedule_reconnect(
                generation,
                self.inner.delays.transient_close,
                "transient close",
            );
        } else {
            info!(generation, "logged out; waiting for operator re-authentication");
        }
    }

    fn on_connect_failure(&self, generation: u64) {
        {
            let mut shared = self.inner.shared.lock();
            if self.generation() != generation {
                return;
            }
            shared.state = ConnectionState::Disconnected;
            shared.pending_qr = None;
            shared.handle = None;
            shared.record.mark_disconnected();
            self.persist(&shared.record);
        }
        self.schedule_reconnect(
            generation,
            self.inner.delays.connect_failure,
            "connect failure",
        );
    }

    /// Schedule a reconnect that only fires if no newer attempt has started
    /// in the meantime (cancellation-by-supersession).
    fn schedule_reconnect(&self, after: u64, delay: Duration, reason: &'static str) {
        info!(
            generation = after,
            delay_ms = delay.as_millis() as u64,
            reason,
            "reconnect scheduled"
        );
        let manager = self.clone();
        let _ = tokio::spawn(async move {
            sleep(delay).await;
            if manager.generation() != after {
                debug!(generation = after, "scheduled reconnect superseded");
                return;
            }
            let _ = manager.start_connect();
        });
    }

    /// Ask the live handle whether it is authenticated right now.
    ///
    /// A present identity is ground truth and wins over a stale disconnected
    /// record; an absent one proves nothing and mutates nothing. Only an
    /// explicit close event removes the connected flag.
    pub async fn verify_live(&self) -> bool {
        let Some(handle) = self.handle_snapshot() else {
            return false;
        };
        match handle.identity().await {
            Some(identity) => {
                let mut shared = self.inner.shared.lock();
                if !shared.record.is_connected {
                    info!(identity = %identity, "live session over stale record, resynchronizing");
                    shared.state = ConnectionState::Connected;
                    shared.pending_qr = None;
                    shared.record.mark_connected(&identity, None);
                    self.persist(&shared.record);
                }
                true
            }
            None => false,
        }
    }

    /// Is it safe to send right now? Requires a live handle and a fresh
    /// liveness confirmation; never trusts the cached flag alone.
    pub async fn can_send_now(&self) -> bool {
        self.socket_active() && self.verify_live().await
    }

    /// One pass of the periodic health sweep: a record that claims connected
    /// but fails the liveness check is a silent disconnect.
    pub async fn sweep_once(&self) {
        let generation = self.generation();
        if !self.record().is_connected {
            return;
        }
        if self.verify_live().await {
            return;
        }
        {
            let mut shared = self.inner.shared.lock();
            // An event-driven transition may have won the race meanwhile.
            if self.generation() != generation || !shared.record.is_connected {
                return;
            }
            shared.state = ConnectionState::Disconnected;
            shared.pending_qr = None;
            shared.handle = None;
            shared.record.mark_disconnected();
            self.persist(&shared.record);
            warn!(generation, "silent disconnect detected by health sweep");
        }
        self.schedule_reconnect(generation, self.inner.delays.transient_close, "health sweep");
    }

    /// Run the health sweep on a fixed interval until the task is dropped.
    pub fn spawn_health_sweep(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the sweep
            // starts one full interval after boot.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.sweep_once().await;
            }
        })
    }

    /// Operator restart: log the current session out, optionally destroy the
    /// credential bundle, and schedule a fresh attempt. A logout failure is
    /// the one lifecycle error surfaced to the caller.
    pub async fn restart(&self, clear_auth: bool) -> Result<(), SessionError> {
        if let Some(handle) = self.handle_snapshot() {
            handle.logout().await?;
        }
        {
            let mut shared = self.inner.shared.lock();
            shared.state = ConnectionState::Disconnected;
            shared.pending_qr = None;
            shared.handle = None;
            if clear_auth {
                shared.record.reset();
                if let Err(e) = self.inner.auth.clear() {
                    error!(error = %e, "failed to clear credential bundle");
                }
            } else {
                shared.record.mark_disconnected();
            }
            self.persist(&shared.record);
        }
        let generation = self.generation();
        self.schedule_reconnect(
            generation,
            self.inner.delays.operator_restart,
            "operator restart",
        );
        Ok(())
    }

    /// Best-effort logout on shutdown.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.handle_snapshot() {
            if let Err(e) = handle.logout().await {
                warn!(error = %e, "logout during shutdown failed");
            }
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        let real_time_connected = self.verify_live().await;
        let shared = self.inner.shared.lock();
        StatusSnapshot {
            record: shared.record.clone(),
            has_qr: shared.pending_qr.is_some(),
            socket_active: shared.handle.is_some(),
            real_time_connected,
        }
    }

    fn persist(&self, record: &ConnectionRecord) {
        if let Err(e) = self.inner.store.save(record) {
            error!(error = %e, "failed to persist connection state");
        }
    }
}

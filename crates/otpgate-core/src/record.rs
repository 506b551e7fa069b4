//! The persisted connection record: the single source of truth for whether
//! the session was ever authenticated, independent of any live handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last-known connection status, persisted across process restarts.
///
/// Exactly one record exists per process. It is mutated only by the
/// connection manager's transition handlers; everything else reads snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionRecord {
    pub is_connected: bool,
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Account identifier owning the session (a network JID).
    pub identity: Option<String>,
    /// Opaque token regenerated on every established connection.
    /// Non-null only while `is_connected` is true.
    pub session_id: Option<String>,
    pub device_id: Option<String>,
}

impl ConnectionRecord {
    /// Apply a successful connection establishment.
    ///
    /// Regenerates `session_id` so each establish is distinguishable from
    /// the previous one.
    pub fn mark_connected(&mut self, identity: &str, device_id: Option<&str>) {
        self.is_connected = true;
        self.last_connected_at = Some(Utc::now());
        self.identity = Some(identity.to_string());
        self.session_id = Some(uuid::Uuid::now_v7().to_string());
        if let Some(device) = device_id {
            self.device_id = Some(device.to_string());
        }
    }

    /// Apply a disconnect. Identity and timestamps survive; the session
    /// token does not.
    pub fn mark_disconnected(&mut self) {
        self.is_connected = false;
        self.session_id = None;
    }

    /// Reset to defaults (auth-clear path).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

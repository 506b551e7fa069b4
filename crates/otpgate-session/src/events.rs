//! Connection-lifecycle events emitted by a session attempt.

/// Why a session closed, as reported by the protocol library.
///
/// Only the distinctions the lifecycle manager acts on are modeled: an
/// unauthorized close destroys the credential bundle, an explicit logout is
/// terminal, anything else retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCode {
    /// Credentials rejected (401-equivalent). Re-authentication required.
    Unauthorized,
    /// The operator logged the account out. Never auto-reconnected.
    LoggedOut,
    /// Any other close (network drop, server restart, timeout, ...).
    Other(u16),
}

impl DisconnectCode {
    /// Whether the manager should schedule another connection attempt.
    pub fn should_reconnect(self) -> bool {
        !matches!(self, Self::LoggedOut)
    }

    /// Whether the stored credential bundle is no longer usable.
    pub fn invalidates_auth(self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Classify a close status code. Explicit logouts are not a bare status
    /// (the library reports them separately), so they never come from here.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            other => Self::Other(other),
        }
    }
}

/// One event on a session attempt's ordered stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A fresh authentication challenge was issued. Single-use and
    /// time-bounded by the protocol library.
    QrIssued(String),
    /// The session is established and authenticated.
    Open {
        identity: String,
        device_id: Option<String>,
    },
    /// The session closed.
    Closed(DisconnectCode),
    /// The credential bundle changed on disk. The connector persists it
    /// itself; observers only need to know it happened.
    CredsUpdated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_out_is_terminal() {
        assert!(!DisconnectCode::LoggedOut.should_reconnect());
        assert!(!DisconnectCode::LoggedOut.invalidates_auth());
    }

    #[test]
    fn unauthorized_reconnects_and_clears_auth() {
        assert!(DisconnectCode::Unauthorized.should_reconnect());
        assert!(DisconnectCode::Unauthorized.invalidates_auth());
    }

    #[test]
    fn transient_codes_reconnect_without_clearing_auth() {
        let code = DisconnectCode::Other(428);
        assert!(code.should_reconnect());
        assert!(!code.invalidates_auth());
    }

    #[test]
    fn from_status_mapping() {
        assert_eq!(DisconnectCode::from_status(401), DisconnectCode::Unauthorized);
        assert_eq!(DisconnectCode::from_status(403), DisconnectCode::Unauthorized);
        assert_eq!(DisconnectCode::from_status(428), DisconnectCode::Other(428));
        assert_eq!(DisconnectCode::from_status(515), DisconnectCode::Other(515));
    }
}

/// Errors surfaced by the session client seam.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("number lookup failed: {0}")]
    Lookup(String),
    #[error("logout failed: {0}")]
    Logout(String),
    #[error("session not usable")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = SessionError::Connect("dns failure".into());
        assert!(err.to_string().contains("dns failure"));
    }
}

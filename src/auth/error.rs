use thiserror::Error;

/// Why a token renewal did not produce a usable token.
///
/// Every variant ends the session: the renewer logs out before the error is
/// handed to the callers waiting on it. It is `Clone` because one outcome is
/// broadcast to all of them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenewalError {
    #[error("no token to renew")]
    NoToken,
    #[error("token cannot be used for renewal: {0}")]
    InvalidToken(String),
    #[error("refresh endpoint rejected the renewal with status {status}")]
    RefreshRejected { status: u16 },
    #[error("refresh request failed: {0}")]
    RefreshTransport(String),
    #[error("refresh request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl RenewalError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RenewalError::NoToken => "no_token",
            RenewalError::InvalidToken(_) => "invalid_token",
            RenewalError::RefreshRejected { .. } => "rejected",
            RenewalError::RefreshTransport(_) => "transport",
            RenewalError::Timeout { .. } => "timeout",
        }
    }
}

//! Remote call failure taxonomy

use thiserror::Error;

/// Result type for backend calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Where a withdrawn request was when the cancellation was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStage {
    /// Cancelled before the request left the client
    BeforeSend,
    /// Cancelled while waiting for the server
    InFlight,
    /// The server answered, but the caller had already withdrawn
    AfterCompletion,
}

/// The three ways a backend call can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// HTTP 401: the session token is no longer valid.
    #[error("unauthorized: session token rejected")]
    Unauthorized,

    /// The caller withdrew the request.
    #[error("request cancelled")]
    Cancelled(CancelStage),

    /// Transport, server or decoding failure.
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemoteError::Cancelled(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Other(format!("request timed out: {}", e))
        } else if e.is_connect() {
            RemoteError::Other(format!("could not reach server: {}", e))
        } else if e.is_decode() {
            RemoteError::Other(format!("failed to parse response: {}", e))
        } else {
            RemoteError::Other(format!("HTTP request failed: {}", e))
        }
    }
}

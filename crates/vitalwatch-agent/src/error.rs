//! Transport and lifecycle errors.

use crate::agent::Lifecycle;

/// Failure delivering something to the collector. Always absorbed by the
/// component that hit it; never reaches the sampling path.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("collector answered with status {0}")]
    Status(u16),

    #[error("push channel is not connected")]
    Disconnected,

    #[error("push channel has shut down")]
    Closed,

    #[error("cannot encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Http(e)
        }
    }
}

/// Errors from constructing or driving an [`Agent`](crate::Agent).
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] vitalwatch_core::Error),

    #[error("agent is {0}, expected stopped")]
    NotStopped(Lifecycle),
}

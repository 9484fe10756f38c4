//! Error types for the chat core.

use tirage_core::error::TirageError;

/// Errors from the chat core and its external calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("breaker open: external service temporarily disabled")]
    BreakerOpen,
    #[error("external call timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream returned an empty response")]
    EmptyResponse,
    #[error("malformed upstream response: {0}")]
    Malformed(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}

impl ChatError {
    /// Whether this outcome counts as a failure of the external dependency.
    ///
    /// Network and connection errors, timeouts, HTTP 5xx and HTTP 429 trip
    /// the breaker; any other answer means the service is reachable.
    pub fn trips_breaker(&self) -> bool {
        match self {
            ChatError::Network(_) | ChatError::Timeout => true,
            ChatError::Upstream { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<TirageError> for ChatError {
    fn from(err: TirageError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

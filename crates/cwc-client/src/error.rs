use thiserror::Error;

/// Failure taxonomy for calls against the remote job services. Per-job
/// errors stay contained in that job's update; only `Auth` and `Config`
/// are process-fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network failure, timeout, or a 5xx. Retried on the next cycle; the
    /// cache keeps its last good value.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Invalid or expired credentials. Stops the loops.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The job disappeared between listing and detail fetch. Callers treat
    /// this as a prune, not an error.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote refused a cancellation (typically already terminal).
    /// Surfaced as a notice, never retried.
    #[error("cancel rejected: {0}")]
    CancelRejected(String),

    /// Missing or malformed endpoint/credential configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SourceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Auth(_) | SourceError::Config(_))
    }

    /// Classify an HTTP response status for a fetch-style call.
    pub fn from_status(status: u16, context: &str) -> SourceError {
        match status {
            401 | 403 => SourceError::Auth(format!("{context}: HTTP {status}")),
            404 => SourceError::NotFound(context.to_string()),
            _ => SourceError::Transient(format!("{context}: HTTP {status}")),
        }
    }

    /// Classify an HTTP response status for a cancellation call, where the
    /// remote signals "already finished" with a client error.
    pub fn from_cancel_status(status: u16, context: &str) -> SourceError {
        match status {
            400 | 409 | 422 => SourceError::CancelRejected(format!("{context}: HTTP {status}")),
            other => SourceError::from_status(other, context),
        }
    }
}

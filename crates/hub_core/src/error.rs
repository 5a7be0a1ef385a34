use thiserror::Error;

use crate::JobId;

/// Failures the core reacts to. IO layers map their own errors into these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Missing or malformed input; surfaced inline, never retried.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A job of the same kind is already in flight for this draft.
    #[error("a job of this kind is already running")]
    Conflict { existing: Option<JobId> },
    /// Transient transport failure.
    #[error("network error: {0}")]
    Network(String),
    /// A single request got no answer in time; the next cycle retries it.
    #[error("request timed out: {0}")]
    RequestTimeout(String),
    /// A job exceeded its time allowance.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Non-2xx answer from the backend.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    /// The backend reported the job as failed.
    #[error("job failed: {0}")]
    JobFailed(String),
    /// Identity gate refused the request.
    #[error("not authenticated")]
    Unauthorized,
}

impl HubError {
    /// Transient errors are retried on the next scheduled cycle and never
    /// shown to the user.
    pub fn is_transient(&self) -> bool {
        matches!(self, HubError::Network(_) | HubError::RequestTimeout(_))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        HubError::Validation(message.into())
    }
}

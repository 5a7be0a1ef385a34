use hub_core::{
    Draft, FlushId, HubError, JobId, JobKind, JobStatusReport, RecoverySnapshot, TimerSlot,
};
use thiserror::Error;

/// Results delivered back to the app's main loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    DraftLoaded {
        draft_id: String,
        remote: Result<Option<Draft>, HubError>,
        recovery: Option<RecoverySnapshot>,
    },
    DraftPersisted {
        draft_id: String,
        flush_id: FlushId,
        result: Result<(), HubError>,
    },
    DraftDeleted {
        draft_id: String,
        result: Result<(), HubError>,
    },
    JobSubmitted {
        kind: JobKind,
        ticket: u64,
        result: Result<JobId, HubError>,
    },
    JobStatus {
        kind: JobKind,
        ticket: u64,
        result: Result<JobStatusReport, HubError>,
    },
    TimerFired {
        slot: TimerSlot,
        token: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("not authenticated")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("conflict with a running job")]
    Conflict { existing: Option<JobId> },
    #[error("http status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
}

impl From<ApiError> for HubError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(message) => HubError::Network(message),
            ApiError::Timeout(message) => HubError::RequestTimeout(message),
            ApiError::Rejected { message, .. } => HubError::Validation(message),
            ApiError::Unauthorized => HubError::Unauthorized,
            ApiError::NotFound => HubError::Server {
                status: 404,
                message: "not found".to_string(),
            },
            ApiError::Conflict { existing } => HubError::Conflict { existing },
            ApiError::Status { status, message } => HubError::Server { status, message },
            ApiError::InvalidUrl(message) => HubError::Validation(format!("invalid API URL: {message}")),
            ApiError::Decode(message) => HubError::Server {
                status: 200,
                message: format!("unexpected response body: {message}"),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("http client setup failed: {0}")]
    Client(#[from] ApiError),
    #[error("could not start the engine runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

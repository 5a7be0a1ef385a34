//! Hub core: pure draft/job state machine and view-model helpers.
mod autosave;
mod draft;
mod effect;
mod error;
mod job;
mod msg;
mod poller;
mod state;
mod store;
pub mod template;
mod update;
mod view_model;
mod wizard;

pub use autosave::{AutosaveScheduler, FlushBatch, FlushId, TimerRequest, DEFAULT_DEBOUNCE};
pub use draft::{
    DocumentKind, Draft, DraftPatch, FieldEntry, FieldPath, FieldValue, FieldWrite, FileRef,
    RecoverySnapshot, StepIndex, StepResult,
};
pub use effect::{Effect, TimerSlot};
pub use error::HubError;
pub use job::{
    build_job_request, JobHandle, JobId, JobKind, JobProgress, JobRequest, JobSlot, JobStatus,
    JobStatusReport, PendingSubmission,
};
pub use msg::Msg;
pub use poller::{
    JobPoller, PollOutcome, PollSchedule, PollerState, DEFAULT_JOB_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
pub use state::{AppState, Notice, NoticeAction, Severity, Timings};
pub use store::{DraftStore, LoadSource, MountRequest, SaveStatus};
pub use update::update;
pub use view_model::{FieldRowView, HubViewModel, JobRowView, ResultRowView};
pub use wizard::{NavBlock, Wizard};

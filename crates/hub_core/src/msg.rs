use chrono::{DateTime, Utc};

use crate::{
    DocumentKind, Draft, FieldPath, FieldValue, FlushId, HubError, JobId, JobKind,
    JobStatusReport, RecoverySnapshot, StepIndex, TimerSlot,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Open a draft for editing.
    Mount {
        draft_id: String,
        owner: String,
        kind: DocumentKind,
    },
    /// Remote and recovery copies read for the pending mount.
    DraftLoaded {
        draft_id: String,
        remote: Result<Option<Draft>, HubError>,
        recovery: Option<RecoverySnapshot>,
        now: DateTime<Utc>,
    },
    /// User edited a form field.
    FieldEdited {
        path: FieldPath,
        value: FieldValue,
        at: DateTime<Utc>,
    },
    /// User asked to save immediately.
    FlushRequested,
    /// Remote write finished.
    DraftPersisted {
        draft_id: String,
        flush_id: FlushId,
        result: Result<(), HubError>,
    },
    NextClicked { at: DateTime<Utc> },
    BackClicked { at: DateTime<Utc> },
    /// Start the AI job attached to `step`.
    RunStepJob { step: StepIndex },
    JobSubmitted {
        kind: JobKind,
        ticket: u64,
        result: Result<JobId, HubError>,
    },
    JobStatusReceived {
        kind: JobKind,
        ticket: u64,
        result: Result<JobStatusReport, HubError>,
    },
    TimerFired { slot: TimerSlot, token: u64 },
    CancelJob { kind: JobKind },
    /// Resubmit after a terminal failure or timeout.
    RetryJob { kind: JobKind },
    /// Drop the job and its result so the step starts over.
    DiscardJob { kind: JobKind },
    /// Delete the draft remotely and locally.
    DiscardDraft,
    DraftDeleted {
        draft_id: String,
        result: Result<(), HubError>,
    },
    NoticeDismissed { id: u64 },
    /// Leaving the editor: timers stop, nothing is flushed.
    Unmounted,
    LoggedOut,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}

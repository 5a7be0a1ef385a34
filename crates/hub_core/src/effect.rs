use std::time::Duration;

use crate::{DraftPatch, FlushId, JobId, JobKind, JobRequest, RecoverySnapshot};

/// Deferred-execution slots. Arming a slot replaces whatever it held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerSlot {
    Autosave,
    Poll(JobKind),
    Deadline(JobKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Read the remote draft and the recovery slot together.
    LoadDraft { draft_id: String },
    PersistDraft {
        draft_id: String,
        flush_id: FlushId,
        patch: DraftPatch,
    },
    DeleteDraft { draft_id: String },
    MirrorRecovery { snapshot: RecoverySnapshot },
    ClearRecovery { draft_id: String },
    SubmitJob {
        kind: JobKind,
        ticket: u64,
        request: JobRequest,
    },
    QueryJobStatus {
        kind: JobKind,
        ticket: u64,
        job_id: JobId,
    },
    StartTimer {
        slot: TimerSlot,
        token: u64,
        delay: Duration,
    },
    CancelTimer { slot: TimerSlot },
}

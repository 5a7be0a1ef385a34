use std::collections::BTreeMap;
use std::time::Duration;

use crate::autosave::{AutosaveScheduler, DEFAULT_DEBOUNCE};
use crate::poller::{JobPoller, PollerState, DEFAULT_JOB_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::store::{DraftStore, LoadSource, MountRequest, SaveStatus};
use crate::view_model::HubViewModel;
use crate::{Draft, JobKind, JobSlot};

/// Delays used by the timers the core asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub debounce: Duration,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What the user can do about a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeAction {
    RetryJob(JobKind),
    DiscardJob(JobKind),
    RetryMount(MountRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub severity: Severity,
    pub message: String,
    pub actions: Vec<NoticeAction>,
}

/// Oldest notices are dropped beyond this.
const MAX_NOTICES: usize = 20;

/// A repeated notice moves to the end instead of stacking up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Notices {
    items: Vec<Notice>,
    next_id: u64,
}

impl Notices {
    pub(crate) fn push(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        actions: Vec<NoticeAction>,
    ) {
        let message = message.into();
        if let Some(index) = self.items.iter().position(|notice| {
            notice.severity == severity && notice.message == message && notice.actions == actions
        }) {
            let repeated = self.items.remove(index);
            self.items.push(repeated);
            return;
        }
        self.next_id += 1;
        self.items.push(Notice {
            id: self.next_id,
            severity,
            message,
            actions,
        });
        if self.items.len() > MAX_NOTICES {
            self.items.remove(0);
        }
    }

    pub(crate) fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|notice| notice.id != id);
        self.items.len() != before
    }

    pub(crate) fn items(&self) -> &[Notice] {
        &self.items
    }
}

/// Monotonic tokens shared by every timer and request the core issues.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct TokenSource {
    last: u64,
}

impl TokenSource {
    pub(crate) fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}

/// A mounted draft with its scheduler and job slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Session {
    pub(crate) store: DraftStore,
    pub(crate) autosave: AutosaveScheduler,
    pub(crate) jobs: BTreeMap<JobKind, JobSlot>,
    pub(crate) source: LoadSource,
    pub(crate) timings: Timings,
}

impl Session {
    pub(crate) fn new(store: DraftStore, source: LoadSource, timings: Timings) -> Self {
        Self {
            store,
            autosave: AutosaveScheduler::new(timings.debounce),
            jobs: BTreeMap::new(),
            source,
            timings,
        }
    }

    pub(crate) fn save_status(&self) -> SaveStatus {
        match self.autosave.last_error() {
            Some(err) if self.autosave.has_pending() => SaveStatus::Failed(err.to_string()),
            _ if self.autosave.in_flight_count() > 0 => SaveStatus::Saving,
            _ if self.autosave.has_pending() => SaveStatus::Pending,
            _ => SaveStatus::Saved,
        }
    }
}

/// Slot for `kind`, created on first use.
pub(crate) fn slot_entry(
    jobs: &mut BTreeMap<JobKind, JobSlot>,
    timings: Timings,
    kind: JobKind,
) -> &mut JobSlot {
    jobs.entry(kind)
        .or_insert_with(|| JobSlot::new(JobPoller::new(timings.poll_interval, timings.job_timeout)))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub(crate) timings: Timings,
    pub(crate) mounting: Option<MountRequest>,
    pub(crate) session: Option<Session>,
    pub(crate) notices: Notices,
    pub(crate) tokens: TokenSource,
    pub(crate) dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timings(timings: Timings) -> Self {
        Self {
            timings,
            ..Self::default()
        }
    }

    pub fn view(&self) -> HubViewModel {
        HubViewModel::build(self)
    }

    /// Returns whether anything changed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.session.as_ref().map(|session| session.store.draft())
    }

    pub fn draft_is_dirty(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.store.is_dirty())
    }

    pub fn load_source(&self) -> Option<LoadSource> {
        self.session.as_ref().map(|session| session.source)
    }

    pub fn save_status(&self) -> Option<SaveStatus> {
        self.session.as_ref().map(Session::save_status)
    }

    pub fn job_state(&self, kind: JobKind) -> PollerState {
        self.session
            .as_ref()
            .and_then(|session| session.jobs.get(&kind))
            .map_or(PollerState::Idle, |slot| slot.poller().state())
    }

    pub fn job_slot(&self, kind: JobKind) -> Option<&JobSlot> {
        self.session.as_ref()?.jobs.get(&kind)
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.items()
    }

    pub fn autosave(&self) -> Option<&AutosaveScheduler> {
        self.session.as_ref().map(|session| &session.autosave)
    }

    /// No load, armed save, write, submission or poll is outstanding. Edits
    /// left over from a failed write wait for the next edit and do not count.
    pub fn is_settled(&self) -> bool {
        if self.mounting.is_some() {
            return false;
        }
        let Some(session) = self.session.as_ref() else {
            return true;
        };
        !session.autosave.is_armed()
            && session.autosave.in_flight_count() == 0
            && session
                .jobs
                .values()
                .all(|slot| !slot.is_submitting() && !slot.poller().is_active())
    }
}

use std::time::Duration;

use crate::{HubError, JobHandle, JobId, JobProgress, JobStatus, JobStatusReport};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    #[default]
    Idle,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl PollerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollerState::Completed
                | PollerState::Failed
                | PollerState::TimedOut
                | PollerState::Cancelled
        )
    }
}

/// Timers to arm after polling starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub ticket: u64,
    pub interval: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Late, duplicate or foreign response; nothing happens.
    Discarded,
    /// Still running; query again after `interval`.
    Continue { interval: Duration },
    /// Transient failure; retried on the next tick.
    Retry { interval: Duration },
    Completed {
        handle: JobHandle,
        payload: serde_json::Value,
    },
    Failed { handle: JobHandle, message: String },
}

/// Observes a server-side job until it reaches a terminal state.
///
/// Every continuation carries the ticket handed out by `start`; anything
/// arriving with another ticket, or outside `Polling`, is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPoller {
    state: PollerState,
    handle: Option<JobHandle>,
    ticket: u64,
    in_flight: bool,
    progress: Option<JobProgress>,
    error: Option<HubError>,
    interval: Duration,
    timeout: Duration,
}

impl JobPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            state: PollerState::Idle,
            handle: None,
            ticket: 0,
            in_flight: false,
            progress: None,
            error: None,
            interval,
            timeout,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }

    pub fn progress(&self) -> Option<&JobProgress> {
        self.progress.as_ref()
    }

    pub fn error(&self) -> Option<&HubError> {
        self.error.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state == PollerState::Polling
    }

    pub fn start(&mut self, handle: JobHandle, ticket: u64) -> PollSchedule {
        self.state = PollerState::Polling;
        self.handle = Some(handle);
        self.ticket = ticket;
        self.in_flight = false;
        self.progress = None;
        self.error = None;
        PollSchedule {
            ticket,
            interval: self.interval,
            timeout: self.timeout,
        }
    }

    /// Interval timer fired: returns the job to query, or `None` when the
    /// tick is stale or a query is already out.
    pub fn tick(&mut self, ticket: u64) -> Option<JobId> {
        if !self.accepts(ticket) || self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.handle.as_ref().map(|handle| handle.job_id.clone())
    }

    /// Deadline timer fired while still polling.
    pub fn deadline(&mut self, ticket: u64) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        self.state = PollerState::TimedOut;
        self.in_flight = false;
        self.error = Some(HubError::Timeout(format!(
            "job did not finish within {}s",
            self.timeout.as_secs()
        )));
        true
    }

    pub fn observe(
        &mut self,
        ticket: u64,
        response: Result<JobStatusReport, HubError>,
    ) -> PollOutcome {
        if !self.accepts(ticket) || !self.in_flight {
            return PollOutcome::Discarded;
        }
        self.in_flight = false;
        let Some(handle) = self.handle.clone() else {
            return PollOutcome::Discarded;
        };

        let report = match response {
            Ok(report) => report,
            Err(err) if err.is_transient() => {
                return PollOutcome::Retry {
                    interval: self.interval,
                };
            }
            Err(err) => {
                let message = err.to_string();
                self.state = PollerState::Failed;
                self.error = Some(err);
                return PollOutcome::Failed { handle, message };
            }
        };

        if let Some(progress) = report.progress {
            self.progress = Some(progress);
        }
        match report.status {
            JobStatus::Pending | JobStatus::Running => PollOutcome::Continue {
                interval: self.interval,
            },
            JobStatus::Succeeded => {
                self.state = PollerState::Completed;
                PollOutcome::Completed {
                    handle,
                    payload: report.result.unwrap_or(serde_json::Value::Null),
                }
            }
            JobStatus::Failed => {
                let message = report
                    .error
                    .unwrap_or_else(|| "job failed without a message".to_string());
                self.state = PollerState::Failed;
                self.error = Some(HubError::JobFailed(message.clone()));
                PollOutcome::Failed { handle, message }
            }
        }
    }

    /// Stops polling. Anything in flight is discarded when it lands.
    pub fn cancel(&mut self) -> bool {
        if self.state != PollerState::Polling {
            return false;
        }
        self.state = PollerState::Cancelled;
        self.in_flight = false;
        true
    }

    /// Back to `Idle`, forgetting the handle.
    pub fn reset(&mut self) {
        let (interval, timeout) = (self.interval, self.timeout);
        *self = Self::new(interval, timeout);
    }

    fn accepts(&self, ticket: u64) -> bool {
        self.state == PollerState::Polling && self.ticket == ticket
    }
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_JOB_TIMEOUT)
    }
}

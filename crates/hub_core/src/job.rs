use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::poller::JobPoller;
use crate::template::StepSpec;
use crate::{Draft, HubError, StepIndex};

/// Opaque, server-issued job identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Analysis,
    Generation,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Analysis => write!(f, "analysis"),
            JobKind::Generation => write!(f, "generation"),
        }
    }
}

impl FromStr for JobKind {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analysis" => Ok(JobKind::Analysis),
            "generation" => Ok(JobKind::Generation),
            other => Err(HubError::validation(format!("unknown job kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub step: u32,
    pub total: u32,
    #[serde(default)]
    pub message: String,
}

/// Answer of `GET job/{jobId}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<JobProgress>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatusReport {
    pub fn running(step: u32, total: u32) -> Self {
        Self {
            status: JobStatus::Running,
            progress: Some(JobProgress {
                step,
                total,
                message: String::new(),
            }),
            result: None,
            error: None,
        }
    }

    pub fn succeeded(result: serde_json::Value) -> Self {
        Self {
            status: JobStatus::Succeeded,
            progress: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            progress: None,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Everything needed to track a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: JobId,
    pub kind: JobKind,
    pub draft_id: String,
    pub step: StepIndex,
    /// Latest field edit the submitted input included.
    pub input_version: Option<DateTime<Utc>>,
}

/// Body of `POST job`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub draft_id: String,
    pub kind: JobKind,
    pub step: StepIndex,
    pub payload: serde_json::Value,
}

/// Submission in progress: the request is out, no job id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub ticket: u64,
    pub step: StepIndex,
    pub input_version: Option<DateTime<Utc>>,
}

/// Builds the job request for `spec`'s step of `draft`.
///
/// The payload carries the step's fields plus fresh results of earlier steps.
pub fn build_job_request(draft: &Draft, spec: &StepSpec) -> Result<JobRequest, HubError> {
    let kind = spec.job.ok_or_else(|| {
        HubError::validation(format!("step {} has no AI job", spec.index))
    })?;
    let missing = draft.missing_fields(spec.index, spec.required);
    if !missing.is_empty() {
        return Err(HubError::validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let fields = serde_json::to_value(draft.step_values(spec.index))
        .map_err(|err| HubError::validation(err.to_string()))?;
    let context: serde_json::Map<String, serde_json::Value> = draft
        .results
        .range(..spec.index)
        .filter(|(_, result)| !result.stale)
        .map(|(step, result)| (step.to_string(), result.payload.clone()))
        .collect();

    Ok(JobRequest {
        draft_id: draft.id.clone(),
        kind,
        step: spec.index,
        payload: serde_json::json!({
            "documentKind": draft.kind,
            "fields": fields,
            "context": context,
        }),
    })
}

/// Submission and polling bookkeeping for one job kind of the mounted draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSlot {
    submission: Option<PendingSubmission>,
    poller: JobPoller,
    last_step: Option<StepIndex>,
}

impl JobSlot {
    pub fn new(poller: JobPoller) -> Self {
        Self {
            submission: None,
            poller,
            last_step: None,
        }
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut JobPoller {
        &mut self.poller
    }

    pub fn is_submitting(&self) -> bool {
        self.submission.is_some()
    }

    /// Step the last submission was made for.
    pub fn last_step(&self) -> Option<StepIndex> {
        self.last_step
    }

    /// Validates and records a submission. A job of this kind already in
    /// flight yields `Conflict` carrying its id when one is known.
    pub fn submit(
        &mut self,
        draft: &Draft,
        spec: &StepSpec,
        ticket: u64,
    ) -> Result<JobRequest, HubError> {
        if self.poller.is_active() {
            return Err(HubError::Conflict {
                existing: self.poller.handle().map(|handle| handle.job_id.clone()),
            });
        }
        if self.submission.is_some() {
            return Err(HubError::Conflict { existing: None });
        }
        let request = build_job_request(draft, spec)?;
        self.submission = Some(PendingSubmission {
            ticket,
            step: spec.index,
            input_version: draft.input_version(spec.index),
        });
        self.last_step = Some(spec.index);
        Ok(request)
    }

    /// Interprets the answer to a submission. `None` means the answer belongs
    /// to a submission that was cancelled or superseded.
    pub fn accept(
        &mut self,
        ticket: u64,
        kind: JobKind,
        draft_id: &str,
        result: Result<JobId, HubError>,
    ) -> Option<Result<JobHandle, HubError>> {
        if self.submission.as_ref()?.ticket != ticket {
            return None;
        }
        let submission = self.submission.take()?;
        let handle = |job_id: JobId| JobHandle {
            job_id,
            kind,
            draft_id: draft_id.to_string(),
            step: submission.step,
            input_version: submission.input_version,
        };
        Some(match result {
            Ok(job_id) => Ok(handle(job_id)),
            Err(HubError::Conflict {
                existing: Some(job_id),
            }) => Ok(handle(job_id)),
            Err(err) => Err(err),
        })
    }

    /// Drops a pending submission and stops polling.
    pub fn cancel(&mut self) -> bool {
        let had_submission = self.submission.take().is_some();
        self.poller.cancel() || had_submission
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{HubError, JobId, JobKind};

pub type StepIndex = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Proposal,
    Newsletter,
}

impl FromStr for DocumentKind {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proposal" => Ok(DocumentKind::Proposal),
            "newsletter" => Ok(DocumentKind::Newsletter),
            other => Err(HubError::validation(format!("unknown document kind '{other}'"))),
        }
    }
}

/// Address of a single form field: `<step>.<name>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    pub step: StepIndex,
    pub name: String,
}

impl FieldPath {
    pub fn new(step: StepIndex, name: impl Into<String>) -> Self {
        Self {
            step,
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.step, self.name)
    }
}

impl FromStr for FieldPath {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (step, name) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| HubError::validation(format!("field path '{s}' must be <step>.<name>")))?;
        let step: StepIndex = step
            .parse()
            .map_err(|_| HubError::validation(format!("invalid step in field path '{s}'")))?;
        if step == 0 || name.is_empty() {
            return Err(HubError::validation(format!("invalid field path '{s}'")));
        }
        Ok(FieldPath::new(step, name))
    }
}

/// Reference to an uploaded object; the upload itself happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldValue {
    Text { value: String },
    Files { files: Vec<FileRef> },
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text {
            value: value.into(),
        }
    }

    /// Whether the value satisfies a "required" constraint.
    pub fn is_present(&self) -> bool {
        match self {
            FieldValue::Text { value } => !value.trim().is_empty(),
            FieldValue::Files { files } => !files.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub value: FieldValue,
    pub edited_at: DateTime<Utc>,
}

/// AI output stored for the step whose job produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub job_id: JobId,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub owner: String,
    pub kind: DocumentKind,
    #[serde(default)]
    pub steps: BTreeMap<StepIndex, BTreeMap<String, FieldEntry>>,
    #[serde(default)]
    pub results: BTreeMap<StepIndex, StepResult>,
    pub current_step: StepIndex,
    pub navigated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(
        id: impl Into<String>,
        owner: impl Into<String>,
        kind: DocumentKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            kind,
            steps: BTreeMap::new(),
            results: BTreeMap::new(),
            current_step: 1,
            navigated_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn field(&self, path: &FieldPath) -> Option<&FieldEntry> {
        self.steps.get(&path.step)?.get(&path.name)
    }

    /// Plain field values of a step, without edit timestamps.
    pub fn step_values(&self, step: StepIndex) -> BTreeMap<String, FieldValue> {
        self.steps
            .get(&step)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Required field names of `step` that are absent or blank.
    pub fn missing_fields(&self, step: StepIndex, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| {
                !self
                    .field(&FieldPath::new(step, **name))
                    .is_some_and(|entry| entry.value.is_present())
            })
            .map(|name| (*name).to_string())
            .collect()
    }

    /// Applies a field value unless a newer edit is already recorded.
    /// Returns whether the stored value changed.
    pub fn set_field(&mut self, path: &FieldPath, value: FieldValue, edited_at: DateTime<Utc>) -> bool {
        let fields = self.steps.entry(path.step).or_default();
        if let Some(existing) = fields.get(&path.name) {
            if existing.edited_at > edited_at {
                return false;
            }
            if existing.value == value && existing.edited_at == edited_at {
                return false;
            }
        }
        fields.insert(path.name.clone(), FieldEntry { value, edited_at });
        self.touch(edited_at);
        true
    }

    pub fn navigate(&mut self, step: StepIndex, at: DateTime<Utc>) -> bool {
        if at < self.navigated_at || (step == self.current_step && at == self.navigated_at) {
            return false;
        }
        self.current_step = step;
        self.navigated_at = at;
        self.touch(at);
        true
    }

    /// Applies a remote write body. Field-by-field latest `edited_at` wins, so
    /// the outcome does not depend on the order patches are applied in.
    pub fn apply_patch(&mut self, patch: &DraftPatch) {
        for write in &patch.writes {
            self.set_field(&write.path, write.value.clone(), write.edited_at);
        }
        self.navigate(patch.current_step, patch.navigated_at);
        for step in &patch.stale_steps {
            if let Some(result) = self.results.get_mut(step) {
                result.stale = true;
            }
        }
    }

    /// Latest edit among the fields of `step` and every earlier step: the
    /// input a job for `step` is computed from.
    pub fn input_version(&self, step: StepIndex) -> Option<DateTime<Utc>> {
        self.steps
            .range(..=step)
            .flat_map(|(_, fields)| fields.values())
            .map(|entry| entry.edited_at)
            .max()
    }

    /// Stores a job result for `step`, replacing any earlier one. A result
    /// computed from input older than the current one is stored stale.
    /// Re-applying the same result is a no-op.
    pub fn apply_job_result(
        &mut self,
        step: StepIndex,
        job_id: &JobId,
        kind: JobKind,
        payload: serde_json::Value,
        input_version: Option<DateTime<Utc>>,
    ) -> bool {
        let next = StepResult {
            job_id: job_id.clone(),
            kind,
            payload,
            stale: self.input_version(step) != input_version,
        };
        if self.results.get(&step) == Some(&next) {
            return false;
        }
        self.results.insert(step, next);
        true
    }

    /// Marks results of `from` and every later step stale. Returns the steps
    /// whose result flipped from fresh to stale.
    pub fn invalidate_from(&mut self, from: StepIndex) -> Vec<StepIndex> {
        self.results
            .range_mut(from..)
            .filter(|(_, result)| !result.stale)
            .map(|(step, result)| {
                result.stale = true;
                *step
            })
            .collect()
    }

    pub fn fresh_result(&self, step: StepIndex) -> Option<&StepResult> {
        self.results.get(&step).filter(|result| !result.stale)
    }

    pub fn stale_steps(&self) -> Vec<StepIndex> {
        self.results
            .iter()
            .filter(|(_, result)| result.stale)
            .map(|(step, _)| *step)
            .collect()
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}

/// One field in a remote write, always the full value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldWrite {
    pub path: FieldPath,
    pub value: FieldValue,
    pub edited_at: DateTime<Utc>,
}

/// Body of `PUT draft/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPatch {
    pub writes: Vec<FieldWrite>,
    pub current_step: StepIndex,
    pub navigated_at: DateTime<Utc>,
    #[serde(default)]
    pub stale_steps: Vec<StepIndex>,
}

/// Local mirror of the draft, kept under `draft:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub draft: Draft,
    /// Fields whose latest value has not been acknowledged remotely.
    #[serde(default)]
    pub unacked: Vec<FieldPath>,
    /// Set by the cache when the snapshot reaches disk.
    #[serde(default)]
    pub written_at: Option<DateTime<Utc>>,
}

impl RecoverySnapshot {
    pub fn cache_key(draft_id: &str) -> String {
        format!("draft:{draft_id}")
    }
}

use chrono::{DateTime, Utc};

use crate::{Draft, DocumentKind, FieldPath, FieldValue, HubError, RecoverySnapshot};

/// Where the mounted draft came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    /// Recovery slot held edits the remote never acknowledged.
    Recovery,
    Fresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    Pending,
    Saving,
    Failed(String),
}

/// Parameters of the mount in progress, used when nothing exists yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub draft_id: String,
    pub owner: String,
    pub kind: DocumentKind,
}

/// Owns the authoritative in-memory draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftStore {
    draft: Draft,
    dirty: bool,
}

impl DraftStore {
    pub fn new(draft: Draft) -> Self {
        Self {
            draft,
            dirty: false,
        }
    }

    /// Cold-start reconciliation between the remote copy and the recovery
    /// slot. Remote wins unless the slot holds unacknowledged edits newer
    /// than it. Returns the store, where it came from, and the fields to
    /// re-queue for autosave.
    pub fn reconcile(
        request: &MountRequest,
        remote: Result<Option<Draft>, HubError>,
        recovery: Option<RecoverySnapshot>,
        now: DateTime<Utc>,
    ) -> Result<(Self, LoadSource, Vec<FieldPath>), HubError> {
        let recovery = recovery.filter(|snapshot| snapshot.draft.id == request.draft_id);
        match (remote, recovery) {
            (Ok(Some(remote)), Some(snapshot))
                if !snapshot.unacked.is_empty() && snapshot.draft.updated_at > remote.updated_at =>
            {
                let mut store = Self::new(snapshot.draft);
                store.dirty = true;
                Ok((store, LoadSource::Recovery, snapshot.unacked))
            }
            (Ok(Some(remote)), _) => Ok((Self::new(remote), LoadSource::Remote, Vec::new())),
            (Ok(None), Some(snapshot)) | (Err(_), Some(snapshot)) => {
                let mut store = Self::new(snapshot.draft);
                store.dirty = !snapshot.unacked.is_empty();
                Ok((store, LoadSource::Recovery, snapshot.unacked))
            }
            (Ok(None), None) => {
                let draft = Draft::new(
                    request.draft_id.clone(),
                    request.owner.clone(),
                    request.kind,
                    now,
                );
                Ok((Self::new(draft), LoadSource::Fresh, Vec::new()))
            }
            (Err(err), None) => Err(err),
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub(crate) fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn id(&self) -> &str {
        &self.draft.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Optimistic local write; the draft stays dirty until acknowledged.
    pub fn save(&mut self, path: &FieldPath, value: FieldValue, at: DateTime<Utc>) -> bool {
        let changed = self.draft.set_field(path, value, at);
        if changed {
            self.dirty = true;
        }
        changed
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Remote confirmation arrived and nothing else is outstanding.
    pub fn ack(&mut self) {
        self.dirty = false;
    }

    pub fn snapshot(&self, unacked: Vec<FieldPath>) -> RecoverySnapshot {
        RecoverySnapshot {
            draft: self.draft.clone(),
            unacked,
            written_at: None,
        }
    }
}

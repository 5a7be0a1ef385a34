use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hub_core::RecoverySnapshot;
use hub_logging::hub_debug;

use crate::filename::cache_filename;
use crate::persist::{AtomicFileWriter, PersistError};

/// Per-device recovery slot: one JSON snapshot per draft, keyed `draft:{id}`.
#[derive(Debug, Clone)]
pub struct RecoveryCache {
    writer: AtomicFileWriter,
}

impl RecoveryCache {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn path_for(&self, draft_id: &str) -> PathBuf {
        self.writer
            .dir()
            .join(cache_filename(&RecoverySnapshot::cache_key(draft_id)))
    }

    pub fn load(&self, draft_id: &str) -> Result<Option<RecoverySnapshot>, PersistError> {
        let filename = cache_filename(&RecoverySnapshot::cache_key(draft_id));
        let Some(bytes) = self.writer.read(&filename)? else {
            return Ok(None);
        };
        let snapshot: RecoverySnapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot))
    }

    /// Writes `snapshot` stamped with `written_at`.
    pub fn store(
        &self,
        snapshot: &RecoverySnapshot,
        written_at: DateTime<Utc>,
    ) -> Result<PathBuf, PersistError> {
        let filename = cache_filename(&RecoverySnapshot::cache_key(&snapshot.draft.id));
        let stamped = RecoverySnapshot {
            written_at: Some(written_at),
            ..snapshot.clone()
        };
        let bytes = serde_json::to_vec_pretty(&stamped)?;
        let path = self.writer.write(&filename, &bytes)?;
        hub_debug!(
            "Recovery snapshot stored ({} unacked fields)",
            snapshot.unacked.len()
        );
        Ok(path)
    }

    pub fn clear(&self, draft_id: &str) -> Result<bool, PersistError> {
        self.writer
            .remove(&cache_filename(&RecoverySnapshot::cache_key(draft_id)))
    }
}

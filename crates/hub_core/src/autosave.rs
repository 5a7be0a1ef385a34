use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{FieldPath, FieldValue, FieldWrite};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

pub type FlushId = u64;

/// Request to (re)arm the debounce timer with `token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub token: u64,
    pub delay: Duration,
}

/// Writes taken out of the buffer for one remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushBatch {
    pub id: FlushId,
    pub writes: Vec<FieldWrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingWrite {
    value: FieldValue,
    edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    writes: Vec<FieldWrite>,
    meta: bool,
}

/// Debounces field mutations into batched remote writes.
///
/// Owned by the mounted session; tokens come from the caller so that a
/// timer armed by a previous session can never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveScheduler {
    delay: Duration,
    pending: BTreeMap<FieldPath, PendingWrite>,
    meta_pending: bool,
    armed: Option<u64>,
    in_flight: BTreeMap<FlushId, InFlight>,
    next_flush_id: FlushId,
    last_error: Option<String>,
    disposed: bool,
}

impl AutosaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: BTreeMap::new(),
            meta_pending: false,
            armed: None,
            in_flight: BTreeMap::new(),
            next_flush_id: 1,
            last_error: None,
            disposed: false,
        }
    }

    /// Records a pending value (last write wins per field) and restarts the
    /// debounce timer.
    pub fn notify(
        &mut self,
        path: FieldPath,
        value: FieldValue,
        edited_at: DateTime<Utc>,
        token: u64,
    ) -> Option<TimerRequest> {
        if self.disposed {
            return None;
        }
        self.pending.insert(path, PendingWrite { value, edited_at });
        Some(self.arm(token))
    }

    /// Schedules a write of the draft's step and result markers.
    pub fn notify_meta(&mut self, token: u64) -> Option<TimerRequest> {
        if self.disposed {
            return None;
        }
        self.meta_pending = true;
        Some(self.arm(token))
    }

    /// Debounce timer fired. Stale tokens are ignored.
    pub fn timer_fired(&mut self, token: u64) -> Option<FlushBatch> {
        if self.disposed || self.armed != Some(token) {
            return None;
        }
        self.armed = None;
        self.take_batch()
    }

    /// Cancels the timer and takes everything pending. The boolean tells
    /// whether a timer was armed and must be cancelled.
    pub fn flush_now(&mut self) -> (bool, Option<FlushBatch>) {
        if self.disposed {
            return (false, None);
        }
        let was_armed = self.armed.take().is_some();
        (was_armed, self.take_batch())
    }

    /// Cancels any pending timer without flushing. Returns whether a timer
    /// was armed.
    pub fn dispose(&mut self) -> bool {
        self.disposed = true;
        self.armed.take().is_some()
    }

    pub fn flush_succeeded(&mut self, id: FlushId) -> bool {
        if self.in_flight.remove(&id).is_none() {
            return false;
        }
        self.last_error = None;
        true
    }

    /// Merges a failed batch back into the pending set. A field already
    /// holding a newer edit keeps it. No timer is armed; the next `notify`
    /// retries.
    pub fn flush_failed(&mut self, id: FlushId, message: impl Into<String>) -> bool {
        let Some(batch) = self.in_flight.remove(&id) else {
            return false;
        };
        for write in batch.writes {
            let keep_newer = self
                .pending
                .get(&write.path)
                .is_some_and(|pending| pending.edited_at > write.edited_at);
            if !keep_newer {
                self.pending.insert(
                    write.path,
                    PendingWrite {
                        value: write.value,
                        edited_at: write.edited_at,
                    },
                );
            }
        }
        if batch.meta {
            self.meta_pending = true;
        }
        self.last_error = Some(message.into());
        true
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.meta_pending
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        !self.has_pending() && self.in_flight.is_empty()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn pending_value(&self, path: &FieldPath) -> Option<&FieldValue> {
        self.pending.get(path).map(|pending| &pending.value)
    }

    /// Paths whose latest value is not yet acknowledged.
    pub fn unacked_paths(&self) -> Vec<FieldPath> {
        let mut paths: Vec<FieldPath> = self.pending.keys().cloned().collect();
        for batch in self.in_flight.values() {
            for write in &batch.writes {
                if !paths.contains(&write.path) {
                    paths.push(write.path.clone());
                }
            }
        }
        paths.sort();
        paths
    }

    fn arm(&mut self, token: u64) -> TimerRequest {
        self.armed = Some(token);
        TimerRequest {
            token,
            delay: self.delay,
        }
    }

    fn take_batch(&mut self) -> Option<FlushBatch> {
        if !self.has_pending() {
            return None;
        }
        let writes: Vec<FieldWrite> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(path, pending)| FieldWrite {
                path,
                value: pending.value,
                edited_at: pending.edited_at,
            })
            .collect();
        let meta = std::mem::take(&mut self.meta_pending);
        let id = self.next_flush_id;
        self.next_flush_id += 1;
        self.in_flight.insert(
            id,
            InFlight {
                writes: writes.clone(),
                meta,
            },
        );
        Some(FlushBatch { id, writes })
    }
}

impl Default for AutosaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

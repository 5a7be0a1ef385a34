use chrono::{DateTime, Utc};
use hub_core::{Effect, Msg};
use hub_engine::{EngineEvent, EngineHandle};
use hub_logging::{hub_debug, hub_info};

/// Hands core effects to the engine.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn into_engine(self) -> EngineHandle {
        self.engine
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::LoadDraft { draft_id } => {
                    hub_info!("LoadDraft draft_id={}", draft_id);
                    self.engine.load_draft(draft_id);
                }
                Effect::PersistDraft {
                    draft_id,
                    flush_id,
                    patch,
                } => {
                    hub_info!(
                        "PersistDraft flush_id={} writes={} step={}",
                        flush_id,
                        patch.writes.len(),
                        patch.current_step
                    );
                    self.engine.persist_draft(draft_id, flush_id, patch);
                }
                Effect::DeleteDraft { draft_id } => {
                    hub_info!("DeleteDraft draft_id={}", draft_id);
                    self.engine.delete_draft(draft_id);
                }
                Effect::MirrorRecovery { snapshot } => {
                    hub_debug!("MirrorRecovery unacked={}", snapshot.unacked.len());
                    self.engine.mirror_recovery(snapshot);
                }
                Effect::ClearRecovery { draft_id } => {
                    self.engine.clear_recovery(draft_id);
                }
                Effect::SubmitJob {
                    kind,
                    ticket,
                    request,
                } => {
                    hub_info!("SubmitJob kind={} step={} ticket={}", kind, request.step, ticket);
                    self.engine.submit_job(kind, ticket, request);
                }
                Effect::QueryJobStatus {
                    kind,
                    ticket,
                    job_id,
                } => {
                    hub_debug!("QueryJobStatus kind={} job_id={} ticket={}", kind, job_id, ticket);
                    self.engine.query_job_status(kind, ticket, job_id);
                }
                Effect::StartTimer { slot, token, delay } => {
                    self.engine.start_timer(slot, token, delay);
                }
                Effect::CancelTimer { slot } => {
                    self.engine.cancel_timer(slot);
                }
            }
        }
    }
}

/// Translates an engine report into the core message it answers.
pub fn event_to_msg(event: EngineEvent, now: DateTime<Utc>) -> Msg {
    match event {
        EngineEvent::DraftLoaded {
            draft_id,
            remote,
            recovery,
        } => Msg::DraftLoaded {
            draft_id,
            remote,
            recovery,
            now,
        },
        EngineEvent::DraftPersisted {
            draft_id,
            flush_id,
            result,
        } => Msg::DraftPersisted {
            draft_id,
            flush_id,
            result,
        },
        EngineEvent::DraftDeleted { draft_id, result } => Msg::DraftDeleted { draft_id, result },
        EngineEvent::JobSubmitted {
            kind,
            ticket,
            result,
        } => Msg::JobSubmitted {
            kind,
            ticket,
            result,
        },
        EngineEvent::JobStatus {
            kind,
            ticket,
            result,
        } => Msg::JobStatusReceived {
            kind,
            ticket,
            result,
        },
        EngineEvent::TimerFired { slot, token } => Msg::TimerFired { slot, token },
    }
}

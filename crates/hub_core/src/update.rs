use chrono::{DateTime, Utc};
use hub_logging::{hub_debug, hub_info, hub_warn};

use crate::autosave::{FlushBatch, TimerRequest};
use crate::poller::PollOutcome;
use crate::state::{slot_entry, Session, Severity};
use crate::store::{DraftStore, LoadSource, MountRequest};
use crate::wizard::Wizard;
use crate::{
    AppState, DocumentKind, Draft, DraftPatch, Effect, FieldPath, FieldValue, FlushId, HubError,
    JobId, JobKind, JobStatusReport, Msg, NoticeAction, RecoverySnapshot, StepIndex, TimerSlot,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Mount {
            draft_id,
            owner,
            kind,
        } => mount(&mut state, draft_id, owner, kind),
        Msg::DraftLoaded {
            draft_id,
            remote,
            recovery,
            now,
        } => draft_loaded(&mut state, &draft_id, remote, recovery, now),
        Msg::FieldEdited { path, value, at } => field_edited(&mut state, path, value, at),
        Msg::FlushRequested => flush_requested(&mut state),
        Msg::DraftPersisted {
            draft_id,
            flush_id,
            result,
        } => draft_persisted(&mut state, &draft_id, flush_id, result),
        Msg::NextClicked { at } => navigate_forward(&mut state, at),
        Msg::BackClicked { at } => navigate_back(&mut state, at),
        Msg::RunStepJob { step } => run_step_job(&mut state, step),
        Msg::JobSubmitted {
            kind,
            ticket,
            result,
        } => job_submitted(&mut state, kind, ticket, result),
        Msg::JobStatusReceived {
            kind,
            ticket,
            result,
        } => job_status_received(&mut state, kind, ticket, result),
        Msg::TimerFired { slot, token } => timer_fired(&mut state, slot, token),
        Msg::CancelJob { kind } => cancel_job(&mut state, kind),
        Msg::RetryJob { kind } => retry_job(&mut state, kind),
        Msg::DiscardJob { kind } => discard_job(&mut state, kind),
        Msg::DiscardDraft => discard_draft(&mut state),
        Msg::DraftDeleted { draft_id, result } => {
            match result {
                Ok(()) => hub_info!("Draft {} deleted", draft_id),
                Err(err) => {
                    hub_warn!("Deleting draft {} failed: {}", draft_id, err);
                    state.notices.push(
                        Severity::Error,
                        format!("Could not delete draft {draft_id}: {err}"),
                        Vec::new(),
                    );
                    state.dirty = true;
                }
            }
            Vec::new()
        }
        Msg::NoticeDismissed { id } => {
            if state.notices.dismiss(id) {
                state.dirty = true;
            }
            Vec::new()
        }
        Msg::Unmounted => teardown(&mut state),
        Msg::LoggedOut => logout(&mut state),
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn mount(state: &mut AppState, draft_id: String, owner: String, kind: DocumentKind) -> Vec<Effect> {
    let mut effects = teardown(state);
    hub_info!("Mounting {:?} draft {} for {}", kind, draft_id, owner);
    state.mounting = Some(MountRequest {
        draft_id: draft_id.clone(),
        owner,
        kind,
    });
    state.dirty = true;
    effects.push(Effect::LoadDraft { draft_id });
    effects
}

fn draft_loaded(
    state: &mut AppState,
    draft_id: &str,
    remote: Result<Option<Draft>, HubError>,
    recovery: Option<RecoverySnapshot>,
    now: DateTime<Utc>,
) -> Vec<Effect> {
    if state.mounting.as_ref().map(|request| request.draft_id.as_str()) != Some(draft_id) {
        hub_debug!("Ignoring load result for {} (not mounting it)", draft_id);
        return Vec::new();
    }
    let Some(request) = state.mounting.take() else {
        return Vec::new();
    };
    state.dirty = true;

    if let Err(err) = &remote {
        hub_warn!("Remote load of {} failed: {}", draft_id, err);
    }
    let (store, source, requeue) = match DraftStore::reconcile(&request, remote, recovery, now) {
        Ok(loaded) => loaded,
        Err(err) => {
            state.notices.push(
                Severity::Error,
                format!("Could not load draft {draft_id}: {err}"),
                vec![NoticeAction::RetryMount(request)],
            );
            return Vec::new();
        }
    };
    hub_info!("Draft {} mounted from {:?}", draft_id, source);

    let mut session = Session::new(store, source, state.timings);
    let mut timer = None;
    for path in requeue {
        let Some(entry) = session.store.draft().field(&path).cloned() else {
            continue;
        };
        timer = session
            .autosave
            .notify(path, entry.value, entry.edited_at, state.tokens.next());
    }
    if source == LoadSource::Recovery && timer.is_some() {
        timer = session.autosave.notify_meta(state.tokens.next());
        state.notices.push(
            Severity::Info,
            "Restored unsaved changes from this device",
            Vec::new(),
        );
    }

    let mut effects = vec![mirror(&session)];
    if let Some(request) = timer {
        effects.push(arm(TimerSlot::Autosave, request));
    }
    state.session = Some(session);
    effects
}

fn field_edited(
    state: &mut AppState,
    path: FieldPath,
    value: FieldValue,
    at: DateTime<Utc>,
) -> Vec<Effect> {
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    if !Wizard::for_draft(session.store.draft()).contains(path.step) {
        state.notices.push(
            Severity::Warning,
            format!("Step {} does not exist in this document", path.step),
            Vec::new(),
        );
        state.dirty = true;
        return Vec::new();
    }
    if !session.store.save(&path, value.clone(), at) {
        return Vec::new();
    }
    state.dirty = true;

    let invalidated = session.store.draft_mut().invalidate_from(path.step);
    if !invalidated.is_empty() {
        hub_info!("Edit of {} invalidated results of steps {:?}", path, invalidated);
        state.notices.push(
            Severity::Info,
            format!("AI results for steps {invalidated:?} need to be regenerated"),
            Vec::new(),
        );
    }

    let timer = session
        .autosave
        .notify(path, value, at, state.tokens.next());
    let mut effects = vec![mirror(session)];
    if let Some(request) = timer {
        effects.push(arm(TimerSlot::Autosave, request));
    }
    effects
}

fn flush_requested(state: &mut AppState) -> Vec<Effect> {
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    let (was_armed, batch) = session.autosave.flush_now();
    let mut effects = Vec::new();
    if was_armed {
        effects.push(Effect::CancelTimer {
            slot: TimerSlot::Autosave,
        });
    }
    if let Some(batch) = batch {
        effects.push(persist(session, batch));
        state.dirty = true;
    }
    effects
}

fn draft_persisted(
    state: &mut AppState,
    draft_id: &str,
    flush_id: FlushId,
    result: Result<(), HubError>,
) -> Vec<Effect> {
    let Some(session) = state.session.as_mut().filter(|s| s.store.id() == draft_id) else {
        hub_debug!("Ignoring write result {} for unmounted draft {}", flush_id, draft_id);
        return Vec::new();
    };
    match result {
        Ok(()) => {
            if !session.autosave.flush_succeeded(flush_id) {
                return Vec::new();
            }
            hub_debug!("Write {} acknowledged", flush_id);
            if session.autosave.is_idle() {
                session.store.ack();
            }
        }
        Err(err) => {
            if !session.autosave.flush_failed(flush_id, err.to_string()) {
                return Vec::new();
            }
            if err.is_transient() {
                hub_debug!("Write {} failed transiently: {}", flush_id, err);
            } else {
                hub_warn!("Write {} rejected: {}", flush_id, err);
                state.notices.push(
                    Severity::Warning,
                    format!("Autosave failed: {err}. Your changes are kept on this device."),
                    Vec::new(),
                );
            }
        }
    }
    state.dirty = true;
    vec![mirror(session)]
}

fn navigate_forward(state: &mut AppState, at: DateTime<Utc>) -> Vec<Effect> {
    let Some(session) = state.session.as_ref() else {
        return Vec::new();
    };
    let wizard = Wizard::for_draft(session.store.draft());
    match wizard.check_forward(session.store.draft()) {
        Ok(next) => navigate_to(state, next, at),
        Err(block) => {
            hub_debug!("Forward navigation blocked: {}", block);
            state
                .notices
                .push(Severity::Warning, block.to_string(), Vec::new());
            state.dirty = true;
            Vec::new()
        }
    }
}

fn navigate_back(state: &mut AppState, at: DateTime<Utc>) -> Vec<Effect> {
    let Some(session) = state.session.as_ref() else {
        return Vec::new();
    };
    match Wizard::for_draft(session.store.draft()).back_target(session.store.draft()) {
        Some(previous) => navigate_to(state, previous, at),
        None => Vec::new(),
    }
}

fn navigate_to(state: &mut AppState, step: StepIndex, at: DateTime<Utc>) -> Vec<Effect> {
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    if !session.store.draft_mut().navigate(step, at) {
        return Vec::new();
    }
    session.store.mark_dirty();
    state.dirty = true;
    let timer = session.autosave.notify_meta(state.tokens.next());
    let mut effects = vec![mirror(session)];
    if let Some(request) = timer {
        effects.push(arm(TimerSlot::Autosave, request));
    }
    effects
}

fn run_step_job(state: &mut AppState, step: StepIndex) -> Vec<Effect> {
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    let Some(spec) = Wizard::for_draft(session.store.draft()).spec(step) else {
        state.notices.push(
            Severity::Warning,
            format!("Step {step} does not exist in this document"),
            Vec::new(),
        );
        state.dirty = true;
        return Vec::new();
    };
    let Some(kind) = spec.job else {
        state.notices.push(
            Severity::Warning,
            format!("Step {step} has no AI job"),
            Vec::new(),
        );
        state.dirty = true;
        return Vec::new();
    };

    let ticket = state.tokens.next();
    let slot = slot_entry(&mut session.jobs, session.timings, kind);
    state.dirty = true;
    match slot.submit(session.store.draft(), spec, ticket) {
        Ok(request) => {
            hub_info!("Submitting {} job for step {}", kind, step);
            vec![Effect::SubmitJob {
                kind,
                ticket,
                request,
            }]
        }
        Err(HubError::Conflict { existing }) => {
            let reused = existing.map_or_else(|| "pending".to_string(), |id| id.to_string());
            hub_info!("{} job already in flight ({}); reusing it", kind, reused);
            state.notices.push(
                Severity::Info,
                format!("The {kind} job is already running ({reused})"),
                Vec::new(),
            );
            Vec::new()
        }
        Err(err) => {
            state
                .notices
                .push(Severity::Warning, err.to_string(), Vec::new());
            Vec::new()
        }
    }
}

fn job_submitted(
    state: &mut AppState,
    kind: JobKind,
    ticket: u64,
    result: Result<JobId, HubError>,
) -> Vec<Effect> {
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    let draft_id = session.store.id().to_string();
    let Some(slot) = session.jobs.get_mut(&kind) else {
        return Vec::new();
    };
    match slot.accept(ticket, kind, &draft_id, result) {
        None => {
            hub_debug!("Discarding submit answer {} for {}", ticket, kind);
            Vec::new()
        }
        Some(Ok(handle)) => {
            hub_info!("{} job {} accepted; polling", kind, handle.job_id);
            let schedule = slot.poller_mut().start(handle, state.tokens.next());
            state.dirty = true;
            vec![
                Effect::StartTimer {
                    slot: TimerSlot::Poll(kind),
                    token: schedule.ticket,
                    delay: schedule.interval,
                },
                Effect::StartTimer {
                    slot: TimerSlot::Deadline(kind),
                    token: schedule.ticket,
                    delay: schedule.timeout,
                },
            ]
        }
        Some(Err(err)) => {
            hub_warn!("Submitting {} job failed: {}", kind, err);
            state.notices.push(
                Severity::Error,
                format!("Could not start the {kind} job: {err}"),
                vec![NoticeAction::RetryJob(kind)],
            );
            state.dirty = true;
            Vec::new()
        }
    }
}

fn job_status_received(
    state: &mut AppState,
    kind: JobKind,
    ticket: u64,
    result: Result<JobStatusReport, HubError>,
) -> Vec<Effect> {
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    let Some(slot) = session.jobs.get_mut(&kind) else {
        return Vec::new();
    };
    match slot.poller_mut().observe(ticket, result) {
        PollOutcome::Discarded => {
            hub_debug!("Discarding status answer {} for {}", ticket, kind);
            Vec::new()
        }
        PollOutcome::Continue { interval } => {
            state.dirty = true;
            vec![Effect::StartTimer {
                slot: TimerSlot::Poll(kind),
                token: ticket,
                delay: interval,
            }]
        }
        PollOutcome::Retry { interval } => {
            hub_debug!("Status query for {} failed transiently; retrying next tick", kind);
            vec![Effect::StartTimer {
                slot: TimerSlot::Poll(kind),
                token: ticket,
                delay: interval,
            }]
        }
        PollOutcome::Completed { handle, payload } => {
            state.dirty = true;
            let mut effects = vec![Effect::CancelTimer {
                slot: TimerSlot::Deadline(kind),
            }];
            if handle.draft_id != session.store.id() {
                return effects;
            }
            hub_info!("{} job {} completed for step {}", kind, handle.job_id, handle.step);
            let draft = session.store.draft_mut();
            let changed = draft.apply_job_result(
                handle.step,
                &handle.job_id,
                kind,
                payload,
                handle.input_version,
            );
            if changed && draft.fresh_result(handle.step).is_none() {
                hub_info!(
                    "{} result for step {} was computed from older input",
                    kind,
                    handle.step
                );
                state.notices.push(
                    Severity::Info,
                    format!(
                        "The {kind} result for step {} used input edited since; run it again",
                        handle.step
                    ),
                    Vec::new(),
                );
            }
            if changed {
                effects.push(mirror(session));
            }
            effects
        }
        PollOutcome::Failed { handle, message } => {
            hub_warn!("{} job {} failed: {}", kind, handle.job_id, message);
            state.notices.push(
                Severity::Error,
                format!("The {kind} job failed: {message}"),
                vec![NoticeAction::RetryJob(kind), NoticeAction::DiscardJob(kind)],
            );
            state.dirty = true;
            vec![Effect::CancelTimer {
                slot: TimerSlot::Deadline(kind),
            }]
        }
    }
}

fn timer_fired(state: &mut AppState, slot: TimerSlot, token: u64) -> Vec<Effect> {
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    match slot {
        TimerSlot::Autosave => match session.autosave.timer_fired(token) {
            Some(batch) => {
                state.dirty = true;
                vec![persist(session, batch)]
            }
            None => Vec::new(),
        },
        TimerSlot::Poll(kind) => {
            let Some(job_slot) = session.jobs.get_mut(&kind) else {
                return Vec::new();
            };
            match job_slot.poller_mut().tick(token) {
                Some(job_id) => vec![Effect::QueryJobStatus {
                    kind,
                    ticket: token,
                    job_id,
                }],
                None => Vec::new(),
            }
        }
        TimerSlot::Deadline(kind) => {
            let Some(job_slot) = session.jobs.get_mut(&kind) else {
                return Vec::new();
            };
            if !job_slot.poller_mut().deadline(token) {
                return Vec::new();
            }
            hub_warn!("{} job timed out", kind);
            state.notices.push(
                Severity::Error,
                format!("The {kind} job took too long and was abandoned"),
                vec![NoticeAction::RetryJob(kind), NoticeAction::DiscardJob(kind)],
            );
            state.dirty = true;
            vec![Effect::CancelTimer {
                slot: TimerSlot::Poll(kind),
            }]
        }
    }
}

fn cancel_job(state: &mut AppState, kind: JobKind) -> Vec<Effect> {
    let Some(slot) = state
        .session
        .as_mut()
        .and_then(|session| session.jobs.get_mut(&kind))
    else {
        return Vec::new();
    };
    if !slot.cancel() {
        return Vec::new();
    }
    hub_info!("{} job cancelled", kind);
    state.dirty = true;
    job_timer_cancels(kind)
}

fn retry_job(state: &mut AppState, kind: JobKind) -> Vec<Effect> {
    let Some(step) = state
        .session
        .as_ref()
        .and_then(|session| session.jobs.get(&kind))
        .filter(|slot| !slot.poller().is_active() && !slot.is_submitting())
        .and_then(|slot| slot.last_step())
    else {
        return Vec::new();
    };
    run_step_job(state, step)
}

fn discard_job(state: &mut AppState, kind: JobKind) -> Vec<Effect> {
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    let Some(slot) = session.jobs.get_mut(&kind) else {
        return Vec::new();
    };
    let mut effects = if slot.cancel() {
        job_timer_cancels(kind)
    } else {
        Vec::new()
    };
    let step = slot.last_step();
    slot.poller_mut().reset();
    state.dirty = true;

    let Some(step) = step else {
        return effects;
    };
    hub_info!("Discarding {} result for step {}", kind, step);
    if !session.store.draft_mut().invalidate_from(step).is_empty() {
        session.store.mark_dirty();
        if let Some(request) = session.autosave.notify_meta(state.tokens.next()) {
            effects.push(mirror(session));
            effects.push(arm(TimerSlot::Autosave, request));
        }
    }
    effects
}

fn discard_draft(state: &mut AppState) -> Vec<Effect> {
    let Some(draft_id) = state
        .session
        .as_ref()
        .map(|session| session.store.id().to_string())
    else {
        return Vec::new();
    };
    let mut effects = teardown(state);
    hub_info!("Discarding draft {}", draft_id);
    effects.push(Effect::DeleteDraft {
        draft_id: draft_id.clone(),
    });
    effects.push(Effect::ClearRecovery { draft_id });
    effects
}

fn logout(state: &mut AppState) -> Vec<Effect> {
    let mut effects = flush_requested(state);
    if let Some(session) = state.session.as_ref() {
        effects.push(Effect::ClearRecovery {
            draft_id: session.store.id().to_string(),
        });
    }
    effects.extend(teardown(state));
    effects
}

/// Disposes the scheduler and cancels every poller of the mounted draft.
fn teardown(state: &mut AppState) -> Vec<Effect> {
    state.mounting = None;
    let Some(mut session) = state.session.take() else {
        return Vec::new();
    };
    state.dirty = true;
    let mut effects = Vec::new();
    if session.autosave.dispose() {
        effects.push(Effect::CancelTimer {
            slot: TimerSlot::Autosave,
        });
    }
    for (kind, slot) in session.jobs.iter_mut() {
        if slot.cancel() {
            effects.extend(job_timer_cancels(*kind));
        }
    }
    hub_info!("Draft {} unmounted", session.store.id());
    effects
}

fn job_timer_cancels(kind: JobKind) -> Vec<Effect> {
    vec![
        Effect::CancelTimer {
            slot: TimerSlot::Poll(kind),
        },
        Effect::CancelTimer {
            slot: TimerSlot::Deadline(kind),
        },
    ]
}

fn arm(slot: TimerSlot, request: TimerRequest) -> Effect {
    Effect::StartTimer {
        slot,
        token: request.token,
        delay: request.delay,
    }
}

fn mirror(session: &Session) -> Effect {
    Effect::MirrorRecovery {
        snapshot: session.store.snapshot(session.autosave.unacked_paths()),
    }
}

/// Remote write for `batch`: full values plus the draft's current markers.
fn persist(session: &Session, batch: FlushBatch) -> Effect {
    let draft = session.store.draft();
    Effect::PersistDraft {
        draft_id: draft.id.clone(),
        flush_id: batch.id,
        patch: DraftPatch {
            writes: batch.writes,
            current_step: draft.current_step,
            navigated_at: draft.navigated_at,
            stale_steps: draft.stale_steps(),
        },
    }
}

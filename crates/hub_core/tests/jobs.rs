use chrono::{DateTime, Utc};
use hub_core::{
    update, AppState, DocumentKind, Effect, FieldValue, HubError, JobId, JobKind, JobProgress,
    JobStatusReport, Msg, NoticeAction, PollerState, Severity, TimerSlot,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    hub_logging::initialize_for_tests();
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("valid timestamp")
}

fn mounted(kind: DocumentKind) -> AppState {
    let (state, _) = update(
        AppState::new(),
        Msg::Mount {
            draft_id: "D1".to_string(),
            owner: "amina".to_string(),
            kind,
        },
    );
    let (state, _) = update(
        state,
        Msg::DraftLoaded {
            draft_id: "D1".to_string(),
            remote: Ok(None),
            recovery: None,
            now: at(0),
        },
    );
    state
}

fn edit(state: AppState, path: &str, text: &str, secs: i64) -> AppState {
    update(
        state,
        Msg::FieldEdited {
            path: path.parse().expect("field path"),
            value: FieldValue::text(text),
            at: at(secs),
        },
    )
    .0
}

/// Proposal mounted with step 1 filled in, ready for its analysis job.
fn proposal_ready() -> AppState {
    edit(mounted(DocumentKind::Proposal), "1.rfp_document", "rfp.pdf", 1)
}

fn submit_ticket(effects: &[Effect]) -> u64 {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::SubmitJob { ticket, .. } => Some(*ticket),
            _ => None,
        })
        .expect("job submitted")
}

fn poll_token(effects: &[Effect], kind: JobKind) -> u64 {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::StartTimer {
                slot: TimerSlot::Poll(slot_kind),
                token,
                ..
            } if *slot_kind == kind => Some(*token),
            _ => None,
        })
        .expect("poll timer armed")
}

fn deadline_token(effects: &[Effect], kind: JobKind) -> u64 {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::StartTimer {
                slot: TimerSlot::Deadline(slot_kind),
                token,
                ..
            } if *slot_kind == kind => Some(*token),
            _ => None,
        })
        .expect("deadline timer armed")
}

/// Runs the step's job up to the point where it is being polled. Returns the
/// poll token.
fn start_job(state: AppState, step: u8, kind: JobKind, job_id: &str) -> (AppState, u64) {
    let (state, effects) = update(state, Msg::RunStepJob { step });
    let ticket = submit_ticket(&effects);
    let (state, effects) = update(
        state,
        Msg::JobSubmitted {
            kind,
            ticket,
            result: Ok(JobId::new(job_id)),
        },
    );
    let token = poll_token(&effects, kind);
    (state, token)
}

/// Fires the poll timer and answers the query with `report`.
fn poll_once(
    state: AppState,
    kind: JobKind,
    token: u64,
    report: Result<JobStatusReport, HubError>,
) -> (AppState, Vec<Effect>) {
    let (state, effects) = update(
        state,
        Msg::TimerFired {
            slot: TimerSlot::Poll(kind),
            token,
        },
    );
    assert!(
        effects
            .iter()
            .any(|effect| matches!(effect, Effect::QueryJobStatus { .. })),
        "tick should query status"
    );
    update(
        state,
        Msg::JobStatusReceived {
            kind,
            ticket: token,
            result: report,
        },
    )
}

fn current_step(state: &AppState) -> u8 {
    state.draft().map(|draft| draft.current_step).expect("mounted")
}

#[test]
fn generation_job_gates_next_until_the_result_arrives() {
    init_logging();
    let state = mounted(DocumentKind::Newsletter);
    let state = edit(state, "1.title", "Drought bulletin", 1);
    let state = edit(state, "1.audience", "Member states", 2);
    let (state, _) = update(state, Msg::NextClicked { at: at(3) });
    assert_eq!(current_step(&state), 2);

    let state = edit(state, "2.topics", "rainfall, livestock", 4);
    let (state, token) = start_job(state, 2, JobKind::Analysis, "A1");
    let (state, _) = poll_once(
        state,
        JobKind::Analysis,
        token,
        Ok(JobStatusReport::succeeded(json!({"themes": 2}))),
    );
    let (state, _) = update(state, Msg::NextClicked { at: at(5) });
    assert_eq!(current_step(&state), 3);

    let (state, token) = start_job(state, 3, JobKind::Generation, "G1");
    let (state, _) = poll_once(
        state,
        JobKind::Generation,
        token,
        Ok(JobStatusReport::running(1, 2)),
    );
    let (state, _) = update(state, Msg::NextClicked { at: at(6) });
    assert_eq!(current_step(&state), 3);

    let (state, _) = poll_once(
        state,
        JobKind::Generation,
        token,
        Ok(JobStatusReport::running(2, 2)),
    );
    assert_eq!(
        state
            .job_slot(JobKind::Generation)
            .and_then(|slot| slot.poller().progress().cloned()),
        Some(JobProgress {
            step: 2,
            total: 2,
            message: String::new(),
        })
    );
    let (state, _) = update(state, Msg::NextClicked { at: at(7) });
    assert_eq!(current_step(&state), 3);

    let (state, effects) = poll_once(
        state,
        JobKind::Generation,
        token,
        Ok(JobStatusReport::succeeded(json!({"outline": ["intro"]}))),
    );
    assert!(effects.contains(&Effect::CancelTimer {
        slot: TimerSlot::Deadline(JobKind::Generation)
    }));
    assert_eq!(state.job_state(JobKind::Generation), PollerState::Completed);
    let (state, _) = update(state, Msg::NextClicked { at: at(8) });
    assert_eq!(current_step(&state), 4);
}

#[test]
fn cancelled_poll_ignores_the_late_response() {
    init_logging();
    let (state, token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let (state, effects) = update(
        state,
        Msg::TimerFired {
            slot: TimerSlot::Poll(JobKind::Analysis),
            token,
        },
    );
    assert_eq!(effects.len(), 1);

    let (state, cancelled) = update(
        state,
        Msg::CancelJob {
            kind: JobKind::Analysis,
        },
    );
    assert_eq!(
        cancelled,
        vec![
            Effect::CancelTimer {
                slot: TimerSlot::Poll(JobKind::Analysis)
            },
            Effect::CancelTimer {
                slot: TimerSlot::Deadline(JobKind::Analysis)
            },
        ]
    );

    let (state, late) = update(
        state,
        Msg::JobStatusReceived {
            kind: JobKind::Analysis,
            ticket: token,
            result: Ok(JobStatusReport::succeeded(json!({"summary": "late"}))),
        },
    );
    assert!(late.is_empty());
    assert_eq!(state.job_state(JobKind::Analysis), PollerState::Cancelled);
    assert!(state.draft().expect("mounted").results.is_empty());
}

#[test]
fn cancel_right_after_submit_applies_nothing() {
    init_logging();
    let (state, effects) = update(proposal_ready(), Msg::RunStepJob { step: 1 });
    let ticket = submit_ticket(&effects);

    let (state, _) = update(
        state,
        Msg::CancelJob {
            kind: JobKind::Analysis,
        },
    );
    let (state, answered) = update(
        state,
        Msg::JobSubmitted {
            kind: JobKind::Analysis,
            ticket,
            result: Ok(JobId::new("A1")),
        },
    );

    assert!(answered.is_empty(), "no polling after cancel");
    assert_eq!(state.job_state(JobKind::Analysis), PollerState::Idle);
    let (state, _) = update(state, Msg::NextClicked { at: at(2) });
    assert_eq!(current_step(&state), 1);
}

#[test]
fn repeated_success_report_is_discarded() {
    init_logging();
    let (state, token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let report = JobStatusReport::succeeded(json!({"summary": "ok"}));
    let (state, _) = poll_once(state, JobKind::Analysis, token, Ok(report.clone()));
    let draft_after_first = state.draft().cloned();

    let (state, again) = update(
        state,
        Msg::JobStatusReceived {
            kind: JobKind::Analysis,
            ticket: token,
            result: Ok(report),
        },
    );

    assert!(again.is_empty());
    assert_eq!(state.draft().cloned(), draft_after_first);
    let result = state
        .draft()
        .and_then(|draft| draft.fresh_result(1).cloned())
        .expect("result stored");
    assert_eq!(result.job_id, JobId::new("A1"));
    assert_eq!(result.payload, json!({"summary": "ok"}));
}

#[test]
fn deadline_times_out_and_offers_retry() {
    init_logging();
    let (state, effects) = update(proposal_ready(), Msg::RunStepJob { step: 1 });
    let ticket = submit_ticket(&effects);
    let (state, effects) = update(
        state,
        Msg::JobSubmitted {
            kind: JobKind::Analysis,
            ticket,
            result: Ok(JobId::new("A1")),
        },
    );
    let deadline = deadline_token(&effects, JobKind::Analysis);
    let poll = poll_token(&effects, JobKind::Analysis);
    let draft_before = state.draft().cloned();

    let (state, timed_out) = update(
        state,
        Msg::TimerFired {
            slot: TimerSlot::Deadline(JobKind::Analysis),
            token: deadline,
        },
    );
    assert_eq!(
        timed_out,
        vec![Effect::CancelTimer {
            slot: TimerSlot::Poll(JobKind::Analysis)
        }]
    );
    assert_eq!(state.job_state(JobKind::Analysis), PollerState::TimedOut);
    assert_eq!(state.draft().cloned(), draft_before);
    let notice = state.notices().last().expect("timeout notice");
    assert_eq!(notice.severity, Severity::Error);
    assert!(notice
        .actions
        .contains(&NoticeAction::RetryJob(JobKind::Analysis)));

    let (state, late_tick) = update(
        state,
        Msg::TimerFired {
            slot: TimerSlot::Poll(JobKind::Analysis),
            token: poll,
        },
    );
    assert!(late_tick.is_empty());

    let (_state, retried) = update(
        state,
        Msg::RetryJob {
            kind: JobKind::Analysis,
        },
    );
    assert!(retried
        .iter()
        .any(|effect| matches!(effect, Effect::SubmitJob { kind: JobKind::Analysis, .. })));
}

#[test]
fn network_error_while_polling_retries_on_the_next_tick() {
    init_logging();
    let (state, token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let (state, effects) = poll_once(
        state,
        JobKind::Analysis,
        token,
        Err(HubError::Network("connection refused".to_string())),
    );

    assert_eq!(poll_token(&effects, JobKind::Analysis), token);
    assert_eq!(state.job_state(JobKind::Analysis), PollerState::Polling);
    assert!(state.notices().is_empty());
}

#[test]
fn slow_status_query_is_retried_and_the_job_keeps_running() {
    init_logging();
    let (state, token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let (state, effects) = poll_once(
        state,
        JobKind::Analysis,
        token,
        Err(HubError::RequestTimeout("operation timed out".to_string())),
    );

    assert_eq!(
        effects,
        vec![Effect::StartTimer {
            slot: TimerSlot::Poll(JobKind::Analysis),
            token,
            delay: state.timings().poll_interval,
        }]
    );
    assert_eq!(state.job_state(JobKind::Analysis), PollerState::Polling);
    assert!(state.notices().is_empty());

    let (state, _) = poll_once(
        state,
        JobKind::Analysis,
        token,
        Ok(JobStatusReport::succeeded(json!({"summary": "ok"}))),
    );
    assert_eq!(state.job_state(JobKind::Analysis), PollerState::Completed);
}

#[test]
fn edit_while_the_job_runs_leaves_its_result_stale() {
    init_logging();
    let (state, token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let state = edit(state, "1.rfp_document", "different_rfp.pdf", 5);
    let (state, _) = poll_once(
        state,
        JobKind::Analysis,
        token,
        Ok(JobStatusReport::succeeded(json!({"summary": "old input"}))),
    );

    assert_eq!(state.job_state(JobKind::Analysis), PollerState::Completed);
    assert_eq!(state.draft().map(|draft| draft.stale_steps()), Some(vec![1]));
    let notice = state.notices().last().expect("stale result notice");
    assert_eq!(notice.severity, Severity::Info);

    let (state, _) = update(state, Msg::NextClicked { at: at(6) });
    assert_eq!(current_step(&state), 1);
    let blocked = state.notices().last().expect("navigation notice");
    assert_eq!(blocked.message, "analysis result is out of date; run it again");
}

#[test]
fn edit_of_a_later_step_keeps_the_result_fresh() {
    init_logging();
    let (state, token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let state = edit(state, "2.concept_text", "drafted early", 5);
    let (state, _) = poll_once(
        state,
        JobKind::Analysis,
        token,
        Ok(JobStatusReport::succeeded(json!({"summary": "ok"}))),
    );

    assert!(state
        .draft()
        .and_then(|draft| draft.fresh_result(1))
        .is_some());
    let (state, _) = update(state, Msg::NextClicked { at: at(6) });
    assert_eq!(current_step(&state), 2);
}

#[test]
fn failed_job_offers_retry_and_discard() {
    init_logging();
    let (state, token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let (state, _) = poll_once(
        state,
        JobKind::Analysis,
        token,
        Ok(JobStatusReport::failed("model unavailable")),
    );

    assert_eq!(state.job_state(JobKind::Analysis), PollerState::Failed);
    let notice = state.notices().last().expect("failure notice");
    assert!(notice.message.contains("model unavailable"));
    assert_eq!(
        notice.actions,
        vec![
            NoticeAction::RetryJob(JobKind::Analysis),
            NoticeAction::DiscardJob(JobKind::Analysis),
        ]
    );
}

#[test]
fn second_run_while_in_flight_reuses_the_running_job() {
    init_logging();
    let (state, _token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let (state, effects) = update(state, Msg::RunStepJob { step: 1 });

    assert!(effects.is_empty());
    let notice = state.notices().last().expect("reuse notice");
    assert_eq!(notice.severity, Severity::Info);
    assert!(notice.message.contains("A1"));
}

#[test]
fn server_conflict_naming_a_job_adopts_it() {
    init_logging();
    let (state, effects) = update(proposal_ready(), Msg::RunStepJob { step: 1 });
    let ticket = submit_ticket(&effects);
    let (state, effects) = update(
        state,
        Msg::JobSubmitted {
            kind: JobKind::Analysis,
            ticket,
            result: Err(HubError::Conflict {
                existing: Some(JobId::new("A0")),
            }),
        },
    );

    let token = poll_token(&effects, JobKind::Analysis);
    let (_state, effects) = update(
        state,
        Msg::TimerFired {
            slot: TimerSlot::Poll(JobKind::Analysis),
            token,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::QueryJobStatus {
            kind: JobKind::Analysis,
            ticket: token,
            job_id: JobId::new("A0"),
        }]
    );
}

#[test]
fn missing_required_fields_block_submission() {
    init_logging();
    let state = mounted(DocumentKind::Proposal);
    let (state, effects) = update(state, Msg::RunStepJob { step: 1 });

    assert!(effects.is_empty());
    let notice = state.notices().last().expect("validation notice");
    assert_eq!(notice.severity, Severity::Warning);
    assert!(notice.message.contains("rfp_document"));
}

#[test]
fn discarding_a_result_marks_it_stale_and_schedules_a_write() {
    init_logging();
    let (state, token) = start_job(proposal_ready(), 1, JobKind::Analysis, "A1");
    let (state, _) = poll_once(
        state,
        JobKind::Analysis,
        token,
        Ok(JobStatusReport::succeeded(json!({"summary": "ok"}))),
    );

    let (state, effects) = update(
        state,
        Msg::DiscardJob {
            kind: JobKind::Analysis,
        },
    );

    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::StartTimer { slot: TimerSlot::Autosave, .. })));
    assert_eq!(state.job_state(JobKind::Analysis), PollerState::Idle);
    assert_eq!(state.draft().map(|draft| draft.stale_steps()), Some(vec![1]));
}

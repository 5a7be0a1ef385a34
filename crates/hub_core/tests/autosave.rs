use chrono::{DateTime, Utc};
use hub_core::{
    update, AppState, DocumentKind, DraftPatch, Effect, FieldPath, FieldValue, FieldWrite,
    HubError, Msg, SaveStatus, TimerSlot,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    hub_logging::initialize_for_tests();
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("valid timestamp")
}

fn mounted() -> AppState {
    let (state, _) = update(
        AppState::new(),
        Msg::Mount {
            draft_id: "D1".to_string(),
            owner: "amina".to_string(),
            kind: DocumentKind::Proposal,
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

fn edit(state: AppState, path: &str, text: &str, secs: i64) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::FieldEdited {
            path: path.parse().expect("field path"),
            value: FieldValue::text(text),
            at: at(secs),
        },
    )
}

fn autosave_token(effects: &[Effect]) -> u64 {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::StartTimer {
                slot: TimerSlot::Autosave,
                token,
                ..
            } => Some(*token),
            _ => None,
        })
        .expect("autosave timer armed")
}

fn persists(effects: &[Effect]) -> Vec<(u64, DraftPatch)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::PersistDraft {
                flush_id, patch, ..
            } => Some((*flush_id, patch.clone())),
            _ => None,
        })
        .collect()
}

fn fire(state: AppState, token: u64) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::TimerFired {
            slot: TimerSlot::Autosave,
            token,
        },
    )
}

#[test]
fn repeated_edits_to_one_field_coalesce_into_one_write() {
    init_logging();
    let state = mounted();
    let (state, first) = edit(state, "1.rfp_document", "v1", 1);
    let first_token = autosave_token(&first);
    let (state, second) = edit(state, "1.rfp_document", "v2", 2);
    let second_token = autosave_token(&second);
    assert_ne!(first_token, second_token);

    // The superseded timer is a no-op even if it still fires.
    let (state, stale) = fire(state, first_token);
    assert!(persists(&stale).is_empty());

    let (_state, fired) = fire(state, second_token);
    let writes = persists(&fired);
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0].1.writes,
        vec![FieldWrite {
            path: FieldPath::new(1, "rfp_document"),
            value: FieldValue::text("v2"),
            edited_at: at(2),
        }]
    );
}

#[test]
fn edits_to_different_fields_merge_into_one_write() {
    init_logging();
    let state = mounted();
    let (state, _) = edit(state, "1.rfp_document", "rfp.pdf", 1);
    let (state, effects) = edit(state, "1.reference_notes", "see annex", 2);

    let (_state, fired) = fire(state, autosave_token(&effects));
    let writes = persists(&fired);
    assert_eq!(writes.len(), 1);
    let paths: Vec<String> = writes[0]
        .1
        .writes
        .iter()
        .map(|write| write.path.to_string())
        .collect();
    assert_eq!(paths, vec!["1.reference_notes", "1.rfp_document"]);
    assert_eq!(writes[0].1.current_step, 1);
}

#[test]
fn every_edit_mirrors_to_the_recovery_slot() {
    init_logging();
    let state = mounted();
    let (state, effects) = edit(state, "1.rfp_document", "rfp.pdf", 1);

    let snapshot = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::MirrorRecovery { snapshot } => Some(snapshot.clone()),
            _ => None,
        })
        .expect("mirror effect");
    assert_eq!(snapshot.unacked, vec![FieldPath::new(1, "rfp_document")]);
    assert_eq!(
        snapshot
            .draft
            .field(&FieldPath::new(1, "rfp_document"))
            .map(|entry| entry.value.clone()),
        Some(FieldValue::text("rfp.pdf"))
    );
    assert!(state.draft_is_dirty());
    assert_eq!(state.save_status(), Some(SaveStatus::Pending));
}

#[test]
fn acknowledged_write_clears_dirty_without_scheduling_another_flush() {
    init_logging();
    let state = mounted();
    let (state, effects) = edit(state, "1.rfp_document", "rfp.pdf", 1);
    let (state, fired) = fire(state, autosave_token(&effects));
    let (flush_id, _) = persists(&fired).remove(0);
    assert_eq!(state.save_status(), Some(SaveStatus::Saving));

    let (state, effects) = update(
        state,
        Msg::DraftPersisted {
            draft_id: "D1".to_string(),
            flush_id,
            result: Ok(()),
        },
    );

    assert!(!state.draft_is_dirty());
    assert_eq!(state.save_status(), Some(SaveStatus::Saved));
    assert!(effects
        .iter()
        .all(|effect| matches!(effect, Effect::MirrorRecovery { .. })));
}

#[test]
fn failed_write_is_merged_back_and_retried_by_the_next_edit() {
    init_logging();
    let state = mounted();
    let (state, effects) = edit(state, "1.rfp_document", "a", 1);
    let (state, fired) = fire(state, autosave_token(&effects));
    let (flush_id, _) = persists(&fired).remove(0);

    // A newer value lands while the write is in flight.
    let (state, _) = edit(state, "1.rfp_document", "b", 3);
    let (state, _) = edit(state, "1.reference_notes", "kept", 2);
    let (state, failed) = update(
        state,
        Msg::DraftPersisted {
            draft_id: "D1".to_string(),
            flush_id,
            result: Err(HubError::Network("connection reset".to_string())),
        },
    );

    assert!(failed
        .iter()
        .all(|effect| matches!(effect, Effect::MirrorRecovery { .. })));
    assert!(matches!(state.save_status(), Some(SaveStatus::Failed(_))));
    assert!(state.notices().is_empty(), "transient failures stay silent");

    let (state, effects) = edit(state, "1.summary", "x", 4);
    let (_state, fired) = fire(state, autosave_token(&effects));
    let writes = persists(&fired);
    assert_eq!(writes.len(), 1);
    let values: Vec<(String, FieldValue)> = writes[0]
        .1
        .writes
        .iter()
        .map(|write| (write.path.to_string(), write.value.clone()))
        .collect();
    assert_eq!(
        values,
        vec![
            ("1.reference_notes".to_string(), FieldValue::text("kept")),
            ("1.rfp_document".to_string(), FieldValue::text("b")),
            ("1.summary".to_string(), FieldValue::text("x")),
        ]
    );
}

#[test]
fn rejected_write_surfaces_a_notice_but_editing_continues() {
    init_logging();
    let state = mounted();
    let (state, effects) = edit(state, "1.rfp_document", "a", 1);
    let (state, fired) = fire(state, autosave_token(&effects));
    let (flush_id, _) = persists(&fired).remove(0);

    let (state, _) = update(
        state,
        Msg::DraftPersisted {
            draft_id: "D1".to_string(),
            flush_id,
            result: Err(HubError::Server {
                status: 500,
                message: "boom".to_string(),
            }),
        },
    );
    assert_eq!(state.notices().len(), 1);

    let (state, effects) = edit(state, "1.rfp_document", "b", 2);
    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::StartTimer { .. })));
    assert_eq!(state.draft().map(|draft| draft.updated_at), Some(at(2)));
}

#[test]
fn timed_out_write_is_kept_quietly_for_the_next_cycle() {
    init_logging();
    let state = mounted();
    let (state, effects) = edit(state, "1.rfp_document", "a", 1);
    let (state, fired) = fire(state, autosave_token(&effects));
    let (flush_id, _) = persists(&fired).remove(0);

    let (state, effects) = update(
        state,
        Msg::DraftPersisted {
            draft_id: "D1".to_string(),
            flush_id,
            result: Err(HubError::RequestTimeout("operation timed out".to_string())),
        },
    );

    assert!(effects
        .iter()
        .all(|effect| matches!(effect, Effect::MirrorRecovery { .. })));
    assert!(state.notices().is_empty());
    assert!(matches!(state.save_status(), Some(SaveStatus::Failed(_))));
    assert!(state.is_settled());

    let (state, effects) = edit(state, "1.summary", "x", 2);
    let (_state, fired) = fire(state, autosave_token(&effects));
    let paths: Vec<String> = persists(&fired)[0]
        .1
        .writes
        .iter()
        .map(|write| write.path.to_string())
        .collect();
    assert_eq!(paths, vec!["1.rfp_document".to_string(), "1.summary".to_string()]);
}

#[test]
fn flush_now_cancels_the_timer_and_writes_immediately() {
    init_logging();
    let state = mounted();
    let (state, effects) = edit(state, "1.rfp_document", "a", 1);
    let token = autosave_token(&effects);

    let (state, flushed) = update(state, Msg::FlushRequested);
    assert_eq!(
        flushed[0],
        Effect::CancelTimer {
            slot: TimerSlot::Autosave
        }
    );
    assert_eq!(persists(&flushed).len(), 1);

    let (_state, late) = fire(state, token);
    assert!(late.is_empty());
}

#[test]
fn unmount_disposes_without_flushing() {
    init_logging();
    let state = mounted();
    let (state, effects) = edit(state, "1.rfp_document", "a", 1);
    let token = autosave_token(&effects);

    let (state, unmounted) = update(state, Msg::Unmounted);
    assert_eq!(
        unmounted,
        vec![Effect::CancelTimer {
            slot: TimerSlot::Autosave
        }]
    );
    assert!(!state.is_mounted());

    let (_state, late) = fire(state, token);
    assert!(late.is_empty());
}

#[test]
fn older_edit_does_not_overwrite_newer_value() {
    init_logging();
    let state = mounted();
    let (state, _) = edit(state, "1.rfp_document", "new", 5);
    let (state, effects) = edit(state, "1.rfp_document", "old", 3);

    assert!(effects.is_empty());
    let draft = state.draft().expect("mounted");
    assert_eq!(
        draft
            .field(&FieldPath::new(1, "rfp_document"))
            .map(|entry| entry.value.clone()),
        Some(FieldValue::text("new"))
    );
}

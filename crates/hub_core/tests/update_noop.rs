use hub_core::{update, AppState, Msg};

#[test]
fn update_is_noop() {
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn edits_without_a_mounted_draft_are_ignored() {
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::FlushRequested);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn fresh_state_is_settled_and_mounting_is_not() {
    let state = AppState::new();
    assert!(state.is_settled());

    let (state, _) = update(
        state,
        Msg::Mount {
            draft_id: "D1".to_string(),
            owner: "amina".to_string(),
            kind: hub_core::DocumentKind::Proposal,
        },
    );
    assert!(!state.is_settled());
}

//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::runtime::testing::{press, say, MockTransport, ScriptedConversation};
use crate::runtime::{ConversationEngine, DispatchOutcome};
use super::navigation::{BACK, CANCEL};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn noop(_: &InboundEvent, _: &mut Answers) -> Result<StepReply, StepError> {
    Ok(StepReply::advance())
}

/// Entry plus one text step at every index in `landing`
fn table_with(landing: impl IntoIterator<Item = usize>) -> Result<StateTable, DefinitionError> {
    let mut steps = vec![Step::entry(noop)];
    steps.extend(landing.into_iter().map(|n| Step::text(n, noop)));
    StateTable::build(steps)
}

const CHAT: ChatId = ChatId(1);

/// User actions against the scripted subscribe dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Start,
    Task,
    Skip,
    Lang,
    NoLang,
    DefaultTime,
    Time,
    BadTime,
    Fault,
    Back,
    Cancel,
}

impl Action {
    fn event(self) -> InboundEvent {
        match self {
            Action::Start => say(CHAT, "/subscribe"),
            Action::Task => press(CHAT, "task:numbers"),
            Action::Skip => press(CHAT, "task:skip"),
            Action::Lang => press(CHAT, "lang:DE"),
            Action::NoLang => press(CHAT, "lang:none"),
            Action::DefaultTime => press(CHAT, "time:default"),
            Action::Time => say(CHAT, "09:30"),
            Action::BadTime => say(CHAT, "half past nine"),
            Action::Fault => say(CHAT, ScriptedConversation::FAULT),
            Action::Back => press(CHAT, BACK),
            Action::Cancel => press(CHAT, CANCEL),
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_outcome() -> impl Strategy<Value = StepOutcome> {
    prop_oneof![
        Just(StepOutcome::Advance),
        Just(StepOutcome::Finish),
        Just(StepOutcome::EarlyFinish),
        (0usize..12).prop_map(StepOutcome::JumpTo),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Start),
        Just(Action::Task),
        Just(Action::Skip),
        Just(Action::Lang),
        Just(Action::NoLang),
        Just(Action::DefaultTime),
        Just(Action::Time),
        Just(Action::BadTime),
        Just(Action::Fault),
        Just(Action::Back),
        Just(Action::Cancel),
    ]
}

fn run_script(actions: &[Action]) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let conversation = Arc::new(ScriptedConversation::new());
        let transport = Arc::new(MockTransport::new());
        let engine =
            ConversationEngine::new(conversation.clone(), Arc::clone(&transport)).unwrap();

        let mut finalized = 0;
        for &action in actions {
            let before = engine.inspect(CHAT).await;
            let event = action.event();
            let outcome = if action == Action::Start {
                engine.start(&event).await
            } else {
                engine.dispatch(&event).await
            };
            let after = engine.inspect(CHAT).await;

            match outcome {
                DispatchOutcome::Finalized => finalized += 1,
                DispatchOutcome::Ended | DispatchOutcome::Cancelled => {
                    prop_assert!(after.is_none(), "{action:?} left a session behind");
                }
                DispatchOutcome::Failed => {
                    prop_assert_eq!(&after, &before, "{:?} changed a failed session", action);
                }
                DispatchOutcome::NoSession => {
                    prop_assert!(before.is_none());
                    prop_assert!(after.is_none());
                }
                DispatchOutcome::Unmatched => prop_assert_eq!(&after, &before),
                DispatchOutcome::Waiting(index) => {
                    let view = after.as_ref();
                    prop_assert_eq!(view.map(|v| v.current), Some(index));
                }
            }
            if outcome == DispatchOutcome::Finalized {
                prop_assert!(after.is_none(), "finalized session still live");
            }
            // Exactly one finalize hook call per finalized session
            prop_assert_eq!(conversation.finalized().len(), finalized);
            if action == Action::Cancel {
                prop_assert!(outcome != DispatchOutcome::Finalized);
            }
        }

        let starts = actions.iter().filter(|&&a| a == Action::Start).count();
        prop_assert!(finalized <= starts);
        Ok(())
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Contiguous registrations always build, in any order
    #[test]
    fn prop_contiguous_states_build(n in 1usize..8, rotate in 0usize..8) {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.rotate_left(rotate % n);
        let table = table_with(indices).unwrap();
        prop_assert_eq!(table.steps(), n);
        prop_assert!(table.is_last(n - 1));
    }

    // A missing landing state is reported by its index
    #[test]
    fn prop_gap_is_rejected(n in 2usize..8, missing in 0usize..8) {
        let missing = missing % (n - 1);
        let result = table_with((0..n).filter(|&i| i != missing));
        prop_assert_eq!(result.err(), Some(DefinitionError::Gap(missing)));
    }

    // Transitions never leave the table
    #[test]
    fn prop_transitions_stay_in_table(n in 1usize..8, at in 0usize..8, outcome in arb_outcome()) {
        let table = table_with(0..n).unwrap();
        let current = StepIndex::At(at % n);
        match transition(&table, current, outcome) {
            Ok(Transition::MoveTo(to)) => prop_assert!(table.contains(to)),
            Ok(Transition::Finalize) => prop_assert!(matches!(
                outcome,
                StepOutcome::EarlyFinish | StepOutcome::Advance
            )),
            Ok(Transition::Terminate) => prop_assert_eq!(outcome, StepOutcome::Finish),
            Err(TransitionError::UnknownState { to, .. }) => {
                prop_assert!(!table.contains(to));
                prop_assert_eq!(outcome, StepOutcome::JumpTo(to));
            }
        }
    }

    // Entry advance always lands on the first state
    #[test]
    fn prop_entry_lands_on_first_state(n in 1usize..8) {
        let table = table_with(0..n).unwrap();
        prop_assert_eq!(
            transition(&table, StepIndex::Entry, StepOutcome::Advance),
            Ok(Transition::MoveTo(0))
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Random user behaviour: finalize at most once per session, cancel never
    // finalizes, failures and unmatched events leave the session as it was
    #[test]
    fn prop_engine_sequences_hold_invariants(
        actions in proptest::collection::vec(arb_action(), 0..30)
    ) {
        run_script(&actions)?;
    }
}

// ============================================================================
// Sequence Tests - Multi-Step Scenarios
// ============================================================================

#[test]
fn test_fault_then_recovery_sequence() {
    run_script(&[
        Action::Start,
        Action::Task,
        Action::Lang,
        Action::Fault,
        Action::BadTime,
        Action::Back,
        Action::Lang,
        Action::Time,
    ])
    .unwrap();
}

//! Pure state transition function
//!
//! Given where a session is and what its step returned, decide where it
//! goes next. No I/O and no session mutation happen here.

use super::step::{StepIndex, StepOutcome};
use super::table::StateTable;
use thiserror::Error;

/// Where a session goes after a completed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Wait at landing state `n`
    MoveTo(usize),
    /// Run the finalize hook, then tear the session down
    Finalize,
    /// Tear the session down without finalizing
    Terminate,
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Step at {from} jumped to unknown state {to}")]
    UnknownState { from: StepIndex, to: usize },
}

/// Pure transition function
pub fn transition(
    table: &StateTable,
    current: StepIndex,
    outcome: StepOutcome,
) -> Result<Transition, TransitionError> {
    match (current, outcome) {
        (_, StepOutcome::Finish) => Ok(Transition::Terminate),
        (_, StepOutcome::EarlyFinish) => Ok(Transition::Finalize),

        (_, StepOutcome::JumpTo(to)) if table.contains(to) => Ok(Transition::MoveTo(to)),
        (from, StepOutcome::JumpTo(to)) => Err(TransitionError::UnknownState { from, to }),

        // Entry always lands on the first state
        (StepIndex::Entry, StepOutcome::Advance) => Ok(Transition::MoveTo(0)),
        (StepIndex::At(n), StepOutcome::Advance) if table.is_last(n) => Ok(Transition::Finalize),
        (StepIndex::At(n), StepOutcome::Advance) if table.contains(n + 1) => {
            Ok(Transition::MoveTo(n + 1))
        }
        (from, StepOutcome::Advance) => Err(TransitionError::UnknownState {
            from,
            to: from.position().map_or(0, |n| n + 1),
        }),
    }
}

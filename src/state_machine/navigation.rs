//! Back / cancel controls shared by every landing state
//!
//! Control buttons carry `action:` callback data and take priority over the
//! domain handlers of whatever state the session is in.

use super::session::{Session, Snapshot};
use super::step::StepIndex;

pub const ACTION_PREFIX: &str = "action:";
pub const BACK: &str = "action:back";
pub const CANCEL: &str = "action:cancel";

pub const BACK_LABEL: &str = "⬅️Back";
pub const CANCEL_LABEL: &str = "❌Cancel";

pub const CANCELED_TEXT: &str = "❌Canceled";
pub const NOTHING_TO_UNDO_TEXT: &str = "Nothing to go back to";

/// Result of applying a control button to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Answers dropped; the session must be torn down without finalizing
    Cancel,
    /// Session rewound to the snapshot's index; its screen must be restored
    Back(Snapshot),
    /// History holds no earlier landing state
    NothingToUndo,
    /// Unknown `action:` value
    Ignored,
}

pub fn is_control(data: &str) -> bool {
    data.starts_with(ACTION_PREFIX)
}

/// Apply a control button. Pure with respect to I/O.
///
/// The entry's own snapshot is never a back target: the entry only runs
/// from its command, so going "back" from the first landing state is a no-op.
pub fn control(session: &mut Session, data: &str) -> Navigation {
    match data {
        CANCEL => {
            session.answers.clear();
            Navigation::Cancel
        }
        BACK => {
            let can_rewind = session
                .history
                .last()
                .is_some_and(|snapshot| matches!(snapshot.index, StepIndex::At(_)));
            if !can_rewind {
                return Navigation::NothingToUndo;
            }
            match session.history.pop() {
                Some(snapshot) => {
                    session.current = snapshot.index;
                    Navigation::Back(snapshot)
                }
                None => Navigation::NothingToUndo,
            }
        }
        _ => Navigation::Ignored,
    }
}

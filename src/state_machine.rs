//! Core conversation state machine
//!
//! A conversation is an explicit registration table of step handlers. The
//! table is built once per definition; sessions walk it one trigger at a
//! time. Step handlers never render directly: they return effects that the
//! runtime executes after the session has been updated.

mod conversation;
mod effect;
pub mod event;
pub mod navigation;
mod session;
mod step;
mod table;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use conversation::{Conversation, FinalizeContext};
pub use effect::{Button, Effect, Keyboard, ParseMode, Screen};
pub use event::{ChatId, InboundEvent, Payload};
pub use session::{Answers, Session, Snapshot};
pub use step::{Step, StepError, StepIndex, StepOutcome, StepReply, Trigger};
pub use table::{DefinitionError, Selection, StateTable};
pub use transition::{transition, Transition, TransitionError};

//! Step registration types

use super::effect::Effect;
use super::event::InboundEvent;
use super::session::Answers;
use crate::store::StoreError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Position of a step inside a conversation definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepIndex {
    /// Reached only when a dialogue is started or restarted
    Entry,
    /// Ordinary landing state
    At(usize),
}

impl StepIndex {
    pub fn position(self) -> Option<usize> {
        match self {
            StepIndex::Entry => None,
            StepIndex::At(n) => Some(n),
        }
    }
}

impl fmt::Display for StepIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepIndex::Entry => write!(f, "entry"),
            StepIndex::At(n) => write!(f, "{n}"),
        }
    }
}

/// What kind of inbound event fires a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Any non-command free text
    Text,
    /// A button whose callback data starts with the step's pattern
    Button,
}

/// How the session moves after a step completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Entry → 0, n → n + 1, last → finalize
    Advance,
    /// Wait at landing state `n` (re-prompt, branch or rewind)
    JumpTo(usize),
    /// End the dialogue without finalizing; the step produced the closing message
    Finish,
    /// Finalize now, skipping any remaining steps
    EarlyFinish,
}

/// Result of a step handler
#[derive(Debug)]
pub struct StepReply {
    pub outcome: StepOutcome,
    pub effects: Vec<Effect>,
}

impl StepReply {
    pub fn new(outcome: StepOutcome) -> Self {
        Self {
            outcome,
            effects: vec![],
        }
    }

    pub fn advance() -> Self {
        Self::new(StepOutcome::Advance)
    }

    pub fn jump_to(index: usize) -> Self {
        Self::new(StepOutcome::JumpTo(index))
    }

    pub fn finish() -> Self {
        Self::new(StepOutcome::Finish)
    }

    pub fn early_finish() -> Self {
        Self::new(StepOutcome::EarlyFinish)
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Unexpected failure inside a step or a finalize hook
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
    #[error("Missing answer: {0}")]
    MissingAnswer(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
}

pub type StepHandler =
    Arc<dyn Fn(&InboundEvent, &mut Answers) -> Result<StepReply, StepError> + Send + Sync>;

/// One registered step handler
#[derive(Clone)]
pub struct Step {
    pub index: StepIndex,
    pub trigger: Trigger,
    pub pattern: Option<String>,
    handler: StepHandler,
}

impl Step {
    /// Unchecked constructor; `StateTable::build` validates the combination
    pub fn new<F>(index: StepIndex, trigger: Trigger, pattern: Option<String>, handler: F) -> Self
    where
        F: Fn(&InboundEvent, &mut Answers) -> Result<StepReply, StepError> + Send + Sync + 'static,
    {
        Self {
            index,
            trigger,
            pattern,
            handler: Arc::new(handler),
        }
    }

    /// The entry step, run by the conversation's command
    pub fn entry<F>(handler: F) -> Self
    where
        F: Fn(&InboundEvent, &mut Answers) -> Result<StepReply, StepError> + Send + Sync + 'static,
    {
        Self::new(StepIndex::Entry, Trigger::Text, None, handler)
    }

    /// A step fired by free text at landing state `index`
    pub fn text<F>(index: usize, handler: F) -> Self
    where
        F: Fn(&InboundEvent, &mut Answers) -> Result<StepReply, StepError> + Send + Sync + 'static,
    {
        Self::new(StepIndex::At(index), Trigger::Text, None, handler)
    }

    /// A step fired by buttons whose data starts with `pattern`
    pub fn button<F>(index: usize, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&InboundEvent, &mut Answers) -> Result<StepReply, StepError> + Send + Sync + 'static,
    {
        Self::new(
            StepIndex::At(index),
            Trigger::Button,
            Some(pattern.into()),
            handler,
        )
    }

    /// Whether this step fires for `event`
    pub fn matches(&self, event: &InboundEvent) -> bool {
        match (self.trigger, event.trigger()) {
            (Trigger::Text, Some(Trigger::Text)) => true,
            (Trigger::Button, Some(Trigger::Button)) => {
                match (self.pattern.as_deref(), event.discriminator()) {
                    (Some(pattern), Some(data)) => data.starts_with(pattern),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    pub(crate) fn run(
        &self,
        event: &InboundEvent,
        answers: &mut Answers,
    ) -> Result<StepReply, StepError> {
        (self.handler)(event, answers)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("index", &self.index)
            .field("trigger", &self.trigger)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

//! State table built from a conversation's registered steps

use super::event::InboundEvent;
use super::navigation::{is_control, ACTION_PREFIX};
use super::step::{Step, StepIndex, Trigger};
use std::collections::BTreeMap;
use thiserror::Error;

/// A conversation definition that cannot be turned into a state table.
/// Always a programming error in the definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("No entry step registered")]
    MissingEntry,
    #[error("More than one entry step registered")]
    DuplicateEntry,
    #[error("Entry step must not be a button step")]
    ButtonEntry,
    #[error("Button step at {0} has no pattern")]
    MissingPattern(StepIndex),
    #[error("Text step at {0} must not have a pattern")]
    UnexpectedPattern(StepIndex),
    #[error("Pattern {pattern:?} at {index} collides with navigation controls")]
    ReservedPattern { index: StepIndex, pattern: String },
    #[error("Two text steps registered at {0}")]
    DuplicateText(StepIndex),
    #[error("Two button steps with pattern {pattern:?} registered at {index}")]
    DuplicatePattern { index: StepIndex, pattern: String },
    #[error("No landing states registered")]
    NoSteps,
    #[error("Landing state {0} is missing")]
    Gap(usize),
}

/// Handler chosen for an inbound event
#[derive(Debug)]
pub enum Selection<'a> {
    /// Back / cancel control with its callback data
    Navigation(&'a str),
    Step(&'a Step),
    None,
}

/// Entry step plus contiguous landing states `0..steps()`
#[derive(Debug)]
pub struct StateTable {
    entry: Step,
    states: Vec<Vec<Step>>,
}

impl StateTable {
    /// Build the table, keeping registration order within a landing state.
    pub fn build(steps: Vec<Step>) -> Result<Self, DefinitionError> {
        let mut entry = None;
        let mut grouped: BTreeMap<usize, Vec<Step>> = BTreeMap::new();

        for step in steps {
            check_step(&step)?;
            match step.index {
                StepIndex::Entry => {
                    if entry.is_some() {
                        return Err(DefinitionError::DuplicateEntry);
                    }
                    entry = Some(step);
                }
                StepIndex::At(n) => {
                    let landing = grouped.entry(n).or_default();
                    check_collision(landing, &step)?;
                    landing.push(step);
                }
            }
        }

        let entry = entry.ok_or(DefinitionError::MissingEntry)?;
        if grouped.is_empty() {
            return Err(DefinitionError::NoSteps);
        }

        let mut states = Vec::with_capacity(grouped.len());
        for (expected, (index, handlers)) in grouped.into_iter().enumerate() {
            if index != expected {
                return Err(DefinitionError::Gap(expected));
            }
            states.push(handlers);
        }

        Ok(Self { entry, states })
    }

    /// Number of landing states, not counting the entry
    pub fn steps(&self) -> usize {
        self.states.len()
    }

    pub fn entry(&self) -> &Step {
        &self.entry
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.states.len()
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.states.len()
    }

    /// Domain handlers of a landing state, in registration order
    pub fn handlers(&self, index: usize) -> Option<&[Step]> {
        self.states.get(index).map(Vec::as_slice)
    }

    /// Pick the handler for `event` at `index`. Navigation controls win over
    /// domain handlers; the entry only runs through its command.
    pub fn select<'a>(&'a self, index: StepIndex, event: &'a InboundEvent) -> Selection<'a> {
        let StepIndex::At(n) = index else {
            return Selection::None;
        };
        if let Some(data) = event.discriminator() {
            if is_control(data) {
                return Selection::Navigation(data);
            }
        }
        self.handlers(n)
            .and_then(|handlers| handlers.iter().find(|step| step.matches(event)))
            .map_or(Selection::None, Selection::Step)
    }
}

fn check_step(step: &Step) -> Result<(), DefinitionError> {
    let pattern = step.pattern.as_deref();
    match (step.index, step.trigger, pattern) {
        (StepIndex::Entry, Trigger::Button, _) => Err(DefinitionError::ButtonEntry),
        (index, Trigger::Text, Some(_)) => Err(DefinitionError::UnexpectedPattern(index)),
        (index, Trigger::Button, None) => Err(DefinitionError::MissingPattern(index)),
        (index, Trigger::Button, Some("")) => Err(DefinitionError::MissingPattern(index)),
        (index, Trigger::Button, Some(p)) if p.starts_with(ACTION_PREFIX) => {
            Err(DefinitionError::ReservedPattern {
                index,
                pattern: p.to_string(),
            })
        }
        _ => Ok(()),
    }
}

fn check_collision(landing: &[Step], step: &Step) -> Result<(), DefinitionError> {
    for existing in landing {
        if existing.trigger != step.trigger {
            continue;
        }
        match step.trigger {
            Trigger::Text => return Err(DefinitionError::DuplicateText(step.index)),
            Trigger::Button if existing.pattern == step.pattern => {
                return Err(DefinitionError::DuplicatePattern {
                    index: step.index,
                    pattern: step.pattern.clone().unwrap_or_default(),
                });
            }
            Trigger::Button => {}
        }
    }
    Ok(())
}

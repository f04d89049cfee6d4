//! Per-chat session state

use super::effect::Screen;
use super::step::{StepError, StepIndex};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Named answers collected by the steps of one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers(BTreeMap<String, String>);

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Answer that an earlier step must have stored
    pub fn require(&self, key: &str) -> Result<&str, StepError> {
        self.get(key)
            .ok_or_else(|| StepError::MissingAnswer(key.to_string()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Answers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// What was on screen when a step completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub index: StepIndex,
    pub screen: Screen,
}

/// One chat's traversal of a conversation definition
#[derive(Debug)]
pub struct Session {
    pub current: StepIndex,
    pub answers: Answers,
    pub history: Vec<Snapshot>,
    /// Last screen shown while waiting at `current`
    pub prompt: Option<Screen>,
    pub last_activity: Instant,
    closed: bool,
}

impl Session {
    pub fn new(now: Instant) -> Self {
        Self {
            current: StepIndex::Entry,
            answers: Answers::new(),
            history: Vec::new(),
            prompt: None,
            last_activity: now,
            closed: false,
        }
    }

    /// Back to the entry with nothing collected (command re-sent)
    pub fn reset(&mut self, now: Instant) {
        self.current = StepIndex::Entry;
        self.answers.clear();
        self.history.clear();
        self.prompt = None;
        self.last_activity = now;
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn is_expired(&self, timeout: Option<Duration>, now: Instant) -> bool {
        timeout.is_some_and(|limit| now.saturating_duration_since(self.last_activity) >= limit)
    }

    /// Clear everything and mark the session unusable. A dispatch that was
    /// waiting on this session sees it as gone.
    pub fn close(&mut self) {
        self.answers.clear();
        self.history.clear();
        self.prompt = None;
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

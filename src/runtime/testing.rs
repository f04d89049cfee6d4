//! Mock implementations for testing
//!
//! These mocks enable engine and bot tests without a real chat network.

use super::traits::*;
use crate::scheduler::JobControl;
use crate::state_machine::{
    Answers, Button, ChatId, Conversation, Effect, FinalizeContext, InboundEvent, Keyboard,
    Screen, Step, StepError, StepReply,
};
use crate::store::SubInfo;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Events
// ============================================================================

/// A typed message
pub fn say(chat_id: ChatId, text: &str) -> InboundEvent {
    InboundEvent::text(chat_id, text)
}

/// A button pressed on the bot's latest message
pub fn press(chat_id: ChatId, data: &str) -> InboundEvent {
    InboundEvent::button(chat_id, data, Screen::default())
        .with_message_id(100)
        .with_callback_id(format!("cb-{data}"))
}

// ============================================================================
// Mock Transport
// ============================================================================

/// One outbound call observed by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Send {
        chat_id: ChatId,
        screen: Screen,
    },
    Edit {
        chat_id: ChatId,
        message_id: i64,
        screen: Screen,
    },
    Ack {
        callback_id: String,
        notice: Option<String>,
    },
}

/// Transport that records every call
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Sent>>,
    failing: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call fail after being recorded
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Text of every sent or edited message, in order
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Send { screen, .. } | Sent::Edit { screen, .. } => Some(screen.text),
                Sent::Ack { .. } => None,
            })
            .collect()
    }

    /// Sent or edited screens addressed to one chat
    pub fn screens_for(&self, chat: ChatId) -> Vec<Screen> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Send { chat_id, screen } | Sent::Edit { chat_id, screen, .. }
                    if chat_id == chat =>
                {
                    Some(screen)
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(sent);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                method: "mock".to_string(),
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, chat_id: ChatId, screen: &Screen) -> Result<(), TransportError> {
        self.record(Sent::Send {
            chat_id,
            screen: screen.clone(),
        })
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: i64,
        screen: &Screen,
    ) -> Result<(), TransportError> {
        self.record(Sent::Edit {
            chat_id,
            message_id,
            screen: screen.clone(),
        })
    }

    async fn acknowledge(
        &self,
        callback_id: &str,
        notice: Option<&str>,
    ) -> Result<(), TransportError> {
        self.record(Sent::Ack {
            callback_id: callback_id.to_string(),
            notice: notice.map(String::from),
        })
    }
}

// ============================================================================
// Scripted Conversation
// ============================================================================

/// Three-step task / language / time dialogue with hooks for failure paths.
///
/// - the entry step fails once [`ScriptedConversation::failing_entry`] is set
/// - `task:skip` finalizes early, `task:lost` jumps to a state that does not exist
/// - `lang:none` ends without finalizing
/// - typing [`ScriptedConversation::FAULT`] at the time prompt fails the step
pub struct ScriptedConversation {
    timeout: Option<Duration>,
    fail_finalize: bool,
    fail_entry: Arc<AtomicBool>,
    gap: bool,
    finalized: Mutex<Vec<(ChatId, Answers)>>,
}

impl ScriptedConversation {
    pub const TASK_PROMPT: &'static str = "Choose a task";
    pub const LANG_PROMPT: &'static str = "Choose a language";
    pub const TIME_PROMPT: &'static str = "Send a time as HH:MM or use the default";
    pub const INVALID_TIME: &'static str = "Invalid time: expected format HH:MM";
    pub const FAULT: &'static str = "boom";

    pub fn new() -> Self {
        Self {
            timeout: None,
            fail_finalize: false,
            fail_entry: Arc::new(AtomicBool::new(false)),
            gap: false,
            finalized: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Record the answers, then fail the hook
    pub fn failing_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }

    /// Fail the entry step
    pub fn failing_entry(self) -> Self {
        self.fail_entry_from_now();
        self
    }

    /// Fail every later entry step, including on engines already built
    pub fn fail_entry_from_now(&self) {
        self.fail_entry.store(true, Ordering::SeqCst);
    }

    /// Register the time prompt one slot too far
    pub fn with_gap(mut self) -> Self {
        self.gap = true;
        self
    }

    /// Every finalize call, in order
    pub fn finalized(&self) -> Vec<(ChatId, Answers)> {
        self.finalized.lock().unwrap().clone()
    }

    fn task_screen() -> Screen {
        Screen::text(Self::TASK_PROMPT).with_keyboard(Keyboard::choice(
            vec![vec![
                Button::new("Numbers", "task:numbers"),
                Button::new("Verbs", "task:verbs"),
            ]],
            true,
        ))
    }

    fn lang_screen() -> Screen {
        Screen::text(Self::LANG_PROMPT).with_keyboard(Keyboard::choice(
            vec![vec![Button::new("DE", "lang:DE"), Button::new("EN", "lang:EN")]],
            false,
        ))
    }

    fn time_screen() -> Screen {
        Screen::text(Self::TIME_PROMPT).with_keyboard(Keyboard::choice(
            vec![vec![Button::new("12:00", "time:default")]],
            false,
        ))
    }
}

fn is_clock(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 5
        && bytes[2] == b':'
        && [0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit())
}

#[async_trait]
impl Conversation for ScriptedConversation {
    fn command(&self) -> &str {
        "subscribe"
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn steps(self: Arc<Self>) -> Vec<Step> {
        let time_at = if self.gap { 3 } else { 2 };
        let fail_entry = Arc::clone(&self.fail_entry);
        vec![
            Step::entry(move |_, _| {
                if fail_entry.load(Ordering::SeqCst) {
                    return Err(StepError::Invalid("entry refused".to_string()));
                }
                Ok(StepReply::advance().with_effect(Effect::render(Self::task_screen())))
            }),
            Step::button(0, "task:", |event, answers| {
                let task = event.button_value().unwrap_or_default();
                answers.insert("task", task);
                Ok(match task {
                    "skip" => StepReply::early_finish(),
                    "lost" => StepReply::jump_to(99),
                    _ => StepReply::advance().with_effect(Effect::render(Self::lang_screen())),
                })
            }),
            Step::button(1, "lang:", |event, answers| {
                let lang = event.button_value().unwrap_or_default();
                if lang == "none" {
                    return Ok(StepReply::finish().with_effect(Effect::render_text("Nothing to do")));
                }
                answers.insert("lang", lang);
                Ok(StepReply::advance().with_effect(Effect::render(Self::time_screen())))
            }),
            Step::button(time_at, "time:", |_, answers| {
                answers.insert("time", "12:00");
                Ok(StepReply::advance())
            }),
            Step::text(time_at, move |event, answers| {
                let text = event.message_text().unwrap_or_default();
                if text == Self::FAULT {
                    answers.insert("time", "corrupted");
                    return Err(StepError::Invalid(text.to_string()));
                }
                if !is_clock(text) {
                    return Ok(StepReply::jump_to(time_at)
                        .with_effect(Effect::render_text(Self::INVALID_TIME)));
                }
                answers.insert("time", text);
                Ok(StepReply::advance())
            }),
        ]
    }

    async fn process_result(
        &self,
        ctx: &FinalizeContext,
        answers: &Answers,
    ) -> Result<Vec<Effect>, StepError> {
        self.finalized
            .lock()
            .unwrap()
            .push((ctx.chat_id, answers.clone()));
        if self.fail_finalize {
            return Err(StepError::Invalid("finalize refused".to_string()));
        }
        Ok(vec![Effect::Send(Screen::text("Subscribed"))])
    }
}

// ============================================================================
// Recording Jobs
// ============================================================================

/// Job control that only records what it was asked to do
#[derive(Default)]
pub struct RecordingJobs {
    scheduled: Mutex<Vec<(ChatId, SubInfo)>>,
}

impl RecordingJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs currently scheduled, in scheduling order
    pub fn scheduled(&self) -> Vec<(ChatId, SubInfo)> {
        self.scheduled.lock().unwrap().clone()
    }
}

impl JobControl for RecordingJobs {
    fn schedule(&self, chat_id: ChatId, sub: &SubInfo) {
        self.scheduled.lock().unwrap().push((chat_id, sub.clone()));
    }

    fn unschedule(&self, chat_id: ChatId, sub: &SubInfo) -> bool {
        let mut scheduled = self.scheduled.lock().unwrap();
        let before = scheduled.len();
        scheduled.retain(|(chat, job)| !(*chat == chat_id && job.task == sub.task && job.lang == sub.lang));
        scheduled.len() != before
    }
}

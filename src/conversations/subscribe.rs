//! `/subscribe`: task, language, then delivery time

use super::{answer, language_buttons, parse_time, ClockTime};
use crate::drill::{Language, Task};
use crate::scheduler::JobControl;
use crate::state_machine::{
    Answers, Button, Conversation, Effect, FinalizeContext, InboundEvent, Keyboard, Screen, Step,
    StepError, StepReply,
};
use crate::store::{SubInfo, SubscriptionStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const TASK_PROMPT: &str = "Select one of available tasks";
pub const LANGUAGE_PROMPT: &str = "Select the language for the task";
pub const ALREADY_SUBSCRIBED_TEXT: &str =
    "You already have this subscription.\nUse /edit command to change its settings";
pub const TIME_PROMPT: &str = "Enter the time for the daily sending in format HH:MM\n\
    You may indicate the timezone by putting its offset after the time\n\
    E.g. 13:45+2";
pub const INVALID_TIME_TEXT: &str = "Invalid time: expected format HH:MM [+X|-X]";

const DEFAULT_TIME: ClockTime = ClockTime {
    hour: 12,
    minute: 0,
    timezone: Some(0),
};

pub struct SubscribeConversation {
    store: Arc<SubscriptionStore>,
    jobs: Arc<dyn JobControl>,
    timeout: Option<Duration>,
}

impl SubscribeConversation {
    pub fn new(store: Arc<SubscriptionStore>, jobs: Arc<dyn JobControl>) -> Self {
        Self {
            store,
            jobs,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn task_screen() -> Screen {
        let rows = Task::ALL
            .iter()
            .map(|task| vec![Button::new(task.display_name(), format!("task:{task}"))])
            .collect();
        Screen::text(TASK_PROMPT).with_keyboard(Keyboard::choice(rows, true))
    }

    fn language_screen() -> Screen {
        Screen::text(LANGUAGE_PROMPT).with_keyboard(Keyboard::choice(language_buttons(), false))
    }

    fn time_keyboard() -> Keyboard {
        Keyboard::choice(
            vec![vec![Button::new("Use default: 12:00 GMT+0", "time:default")]],
            false,
        )
    }

    fn choose_task(event: &InboundEvent, answers: &mut Answers) -> Result<StepReply, StepError> {
        let task: Task = event
            .button_value()
            .unwrap_or_default()
            .parse()
            .map_err(|e| StepError::Invalid(format!("{e}")))?;
        answers.insert("task", task.as_str());
        Ok(StepReply::advance().with_effect(Effect::render(Self::language_screen())))
    }

    fn choose_language(
        &self,
        event: &InboundEvent,
        answers: &mut Answers,
    ) -> Result<StepReply, StepError> {
        let task: Task = answer(answers, "task")?;
        let lang: Language = event
            .button_value()
            .unwrap_or_default()
            .parse()
            .map_err(|e| StepError::Invalid(format!("{e}")))?;

        if self.store.has_sub(event.chat_id, task, lang)? {
            return Ok(StepReply::finish().with_effect(Effect::render_text(ALREADY_SUBSCRIBED_TEXT)));
        }

        answers.insert("lang", lang.code());
        Ok(StepReply::advance().with_effect(Effect::render(
            Screen::text(TIME_PROMPT).with_keyboard(Self::time_keyboard()),
        )))
    }

    fn enter_time(event: &InboundEvent, answers: &mut Answers) -> Result<StepReply, StepError> {
        let Some(time) = parse_time(event.message_text().unwrap_or_default()) else {
            return Ok(StepReply::jump_to(2).with_effect(Effect::render(
                Screen::text(INVALID_TIME_TEXT).with_keyboard(Self::time_keyboard()),
            )));
        };
        record_time(answers, time);
        Ok(StepReply::advance())
    }
}

fn record_time(answers: &mut Answers, time: ClockTime) {
    answers.insert("hour", time.hour.to_string());
    answers.insert("minute", time.minute.to_string());
    answers.insert("timezone", time.timezone.unwrap_or(0).to_string());
}

#[async_trait]
impl Conversation for SubscribeConversation {
    fn command(&self) -> &str {
        "subscribe"
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn steps(self: Arc<Self>) -> Vec<Step> {
        vec![
            Step::entry(|_, _| {
                Ok(StepReply::advance().with_effect(Effect::render(Self::task_screen())))
            }),
            Step::button(0, "task:", Self::choose_task),
            Step::button(1, "lang:", move |event, answers| {
                self.choose_language(event, answers)
            }),
            Step::button(2, "time:", |_, answers| {
                record_time(answers, DEFAULT_TIME);
                Ok(StepReply::advance())
            }),
            Step::text(2, Self::enter_time),
        ]
    }

    async fn process_result(
        &self,
        ctx: &FinalizeContext,
        answers: &Answers,
    ) -> Result<Vec<Effect>, StepError> {
        let sub = SubInfo {
            task: answer(answers, "task")?,
            lang: answer(answers, "lang")?,
            hour: answer(answers, "hour")?,
            minute: answer(answers, "minute")?,
            timezone: answer(answers, "timezone")?,
        };
        self.store.add_sub(ctx.chat_id, sub.clone())?;
        self.jobs.schedule(ctx.chat_id, &sub);
        tracing::info!(
            chat_id = %ctx.chat_id,
            task = %sub.task,
            lang = %sub.lang,
            schedule = %sub.schedule(),
            "Subscribed"
        );

        Ok(vec![Effect::render(
            Screen::text(format!(
                "✅ *Subscribed!*\n{} {} - {}",
                sub.task.display_name(),
                sub.lang.emoji(),
                sub.schedule()
            ))
            .markdown(),
        )])
    }
}

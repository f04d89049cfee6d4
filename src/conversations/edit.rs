//! `/edit`: change the schedule, timezone or language of a subscription

use super::subscribe::ALREADY_SUBSCRIBED_TEXT;
use super::{
    answer, language_buttons, parse_sub_key, parse_time, parse_timezone, subscription_buttons,
    NO_SUBSCRIPTIONS_TEXT,
};
use crate::drill::{Language, Task};
use crate::scheduler::JobControl;
use crate::state_machine::{
    Answers, Button, Conversation, Effect, FinalizeContext, InboundEvent, Keyboard, Screen, Step,
    StepError, StepReply,
};
use crate::store::SubscriptionStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const CHOOSE_TASK_TEXT: &str = "Choose the task to edit";
pub const CHOOSE_SETTING_TEXT: &str = "Choose the setting to edit";
pub const SCHEDULE_PROMPT: &str = "Enter new schedule time in format HH:MM";
pub const TIMEZONE_PROMPT: &str =
    "Enter new timezone in format +X or -X, where X is timezone hour offset";
pub const LANGUAGE_PROMPT: &str = "Choose language";
pub const INVALID_TIME_TEXT: &str = "Invalid time: expected format HH:MM";
pub const INVALID_TIMEZONE_TEXT: &str = "Invalid timezone: expected format +X or -X";

const SCHEDULE_STATE: usize = 2;
const TIMEZONE_STATE: usize = 3;
const LANGUAGE_STATE: usize = 4;

pub struct EditConversation {
    store: Arc<SubscriptionStore>,
    jobs: Arc<dyn JobControl>,
    timeout: Option<Duration>,
}

impl EditConversation {
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

    /// Screen with only the navigation row
    fn prompt(text: &str) -> Screen {
        Screen::text(text).with_keyboard(Keyboard::choice(vec![], false))
    }

    fn list(&self, event: &InboundEvent) -> Result<StepReply, StepError> {
        let subs = self.store.get_subs(event.chat_id)?;
        if subs.is_empty() {
            return Ok(StepReply::finish().with_effect(Effect::render_text(NO_SUBSCRIPTIONS_TEXT)));
        }
        Ok(StepReply::advance().with_effect(Effect::render(
            Screen::text(CHOOSE_TASK_TEXT)
                .with_keyboard(Keyboard::choice(subscription_buttons(&subs), true)),
        )))
    }

    fn choose_task(event: &InboundEvent, answers: &mut Answers) -> Result<StepReply, StepError> {
        let (task, lang) = parse_sub_key(event.button_value().unwrap_or_default())?;
        answers.insert("task", task.as_str());
        answers.insert("lang", lang.code());

        let settings = vec![vec![
            Button::new("📅Schedule", "setting:schedule"),
            Button::new("🕕Timezone", "setting:timezone"),
            Button::new("🌐Language", "setting:language"),
        ]];
        Ok(StepReply::advance().with_effect(Effect::render(
            Screen::text(CHOOSE_SETTING_TEXT).with_keyboard(Keyboard::choice(settings, false)),
        )))
    }

    fn choose_setting(event: &InboundEvent, _: &mut Answers) -> Result<StepReply, StepError> {
        let (state, screen) = match event.button_value().unwrap_or_default() {
            "schedule" => (SCHEDULE_STATE, Self::prompt(SCHEDULE_PROMPT)),
            "timezone" => (TIMEZONE_STATE, Self::prompt(TIMEZONE_PROMPT)),
            "language" => (
                LANGUAGE_STATE,
                Screen::text(LANGUAGE_PROMPT)
                    .with_keyboard(Keyboard::choice(language_buttons(), false)),
            ),
            other => return Err(StepError::Invalid(format!("setting {other:?}"))),
        };
        Ok(StepReply::jump_to(state).with_effect(Effect::render(screen)))
    }

    fn enter_schedule(event: &InboundEvent, answers: &mut Answers) -> Result<StepReply, StepError> {
        let time = parse_time(event.message_text().unwrap_or_default())
            .filter(|time| time.timezone.is_none());
        let Some(time) = time else {
            return Ok(StepReply::jump_to(SCHEDULE_STATE)
                .with_effect(Effect::render(Self::prompt(INVALID_TIME_TEXT))));
        };
        answers.insert("new_hour", time.hour.to_string());
        answers.insert("new_minute", time.minute.to_string());
        Ok(StepReply::early_finish())
    }

    fn enter_timezone(event: &InboundEvent, answers: &mut Answers) -> Result<StepReply, StepError> {
        let Some(timezone) = parse_timezone(event.message_text().unwrap_or_default()) else {
            return Ok(StepReply::jump_to(TIMEZONE_STATE)
                .with_effect(Effect::render(Self::prompt(INVALID_TIMEZONE_TEXT))));
        };
        answers.insert("new_timezone", timezone.to_string());
        Ok(StepReply::early_finish())
    }

    fn choose_language(
        &self,
        event: &InboundEvent,
        answers: &mut Answers,
    ) -> Result<StepReply, StepError> {
        let task: Task = answer(answers, "task")?;
        let lang: Language = answer(answers, "lang")?;
        let new_lang: Language = event
            .button_value()
            .unwrap_or_default()
            .parse()
            .map_err(|e| StepError::Invalid(format!("{e}")))?;

        if new_lang != lang && self.store.has_sub(event.chat_id, task, new_lang)? {
            return Ok(StepReply::finish().with_effect(Effect::render_text(ALREADY_SUBSCRIBED_TEXT)));
        }
        answers.insert("new_lang", new_lang.code());
        Ok(StepReply::early_finish())
    }
}

#[async_trait]
impl Conversation for EditConversation {
    fn command(&self) -> &str {
        "edit"
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn steps(self: Arc<Self>) -> Vec<Step> {
        let lister = Arc::clone(&self);
        vec![
            Step::entry(move |event, _| lister.list(event)),
            Step::button(0, "task:", Self::choose_task),
            Step::button(1, "setting:", Self::choose_setting),
            Step::text(SCHEDULE_STATE, Self::enter_schedule),
            Step::text(TIMEZONE_STATE, Self::enter_timezone),
            Step::button(LANGUAGE_STATE, "lang:", move |event, answers| {
                self.choose_language(event, answers)
            }),
        ]
    }

    async fn process_result(
        &self,
        ctx: &FinalizeContext,
        answers: &Answers,
    ) -> Result<Vec<Effect>, StepError> {
        let task: Task = answer(answers, "task")?;
        let lang: Language = answer(answers, "lang")?;

        let schedule: Option<(u32, u32)> = if answers.contains("new_hour") {
            Some((answer(answers, "new_hour")?, answer(answers, "new_minute")?))
        } else {
            None
        };
        let timezone: Option<i32> = answers
            .contains("new_timezone")
            .then(|| answer(answers, "new_timezone"))
            .transpose()?;
        let new_lang: Option<Language> = answers
            .contains("new_lang")
            .then(|| answer(answers, "new_lang"))
            .transpose()?;

        // Jobs follow the store only once the new settings are on disk
        let (old, new) = self.store.replace_sub(ctx.chat_id, task, lang, |sub| {
            if let Some((hour, minute)) = schedule {
                sub.hour = hour;
                sub.minute = minute;
            }
            if let Some(timezone) = timezone {
                sub.timezone = timezone;
            }
            if let Some(lang) = new_lang {
                sub.lang = lang;
            }
        })?;
        self.jobs.unschedule(ctx.chat_id, &old);
        self.jobs.schedule(ctx.chat_id, &new);
        tracing::info!(
            chat_id = %ctx.chat_id,
            task = %task,
            lang = %new.lang,
            schedule = %new.schedule(),
            "Subscription edited"
        );

        Ok(vec![Effect::render_text(format!(
            "New settings - {} {}",
            new.schedule(),
            new.lang.emoji()
        ))])
    }
}

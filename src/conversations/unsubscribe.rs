//! `/unsubscribe`: drop one subscription or all of them

use super::{answer, parse_sub_key, subscription_buttons, NO_SUBSCRIPTIONS_TEXT};
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

pub const CHOOSE_TEXT: &str = "Choose the task to unsubscribe from";
pub const ALL_LABEL: &str = "Unsubscribe from all";
pub const ALL_DATA: &str = "unsub_all";
pub const UNSUBSCRIBED_ALL_TEXT: &str = "❌ *Unsubscribed from all tasks*";

pub struct UnsubscribeConversation {
    store: Arc<SubscriptionStore>,
    jobs: Arc<dyn JobControl>,
    timeout: Option<Duration>,
}

impl UnsubscribeConversation {
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

    fn list(&self, event: &InboundEvent) -> Result<StepReply, StepError> {
        let subs = self.store.get_subs(event.chat_id)?;
        if subs.is_empty() {
            return Ok(StepReply::finish().with_effect(Effect::render_text(NO_SUBSCRIPTIONS_TEXT)));
        }

        let mut rows = subscription_buttons(&subs);
        rows.push(vec![Button::new(ALL_LABEL, ALL_DATA)]);
        Ok(StepReply::advance().with_effect(Effect::render(
            Screen::text(CHOOSE_TEXT).with_keyboard(Keyboard::choice(rows, true)),
        )))
    }

    fn choose(event: &InboundEvent, answers: &mut Answers) -> Result<StepReply, StepError> {
        let (task, lang) = parse_sub_key(event.button_value().unwrap_or_default())?;
        answers.insert("task", task.as_str());
        answers.insert("lang", lang.code());
        Ok(StepReply::advance())
    }
}

#[async_trait]
impl Conversation for UnsubscribeConversation {
    fn command(&self) -> &str {
        "unsubscribe"
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn steps(self: Arc<Self>) -> Vec<Step> {
        vec![
            Step::entry(move |event, _| self.list(event)),
            Step::button(0, "task:", Self::choose),
            Step::button(0, ALL_DATA, |_, answers| {
                answers.insert("all", "true");
                Ok(StepReply::advance())
            }),
        ]
    }

    async fn process_result(
        &self,
        ctx: &FinalizeContext,
        answers: &Answers,
    ) -> Result<Vec<Effect>, StepError> {
        if answers.contains("all") {
            let removed = self.store.remove_subs(ctx.chat_id)?;
            for sub in &removed {
                self.jobs.unschedule(ctx.chat_id, sub);
            }
            tracing::info!(chat_id = %ctx.chat_id, count = removed.len(), "Unsubscribed from all");
            return Ok(vec![Effect::render(Screen::text(UNSUBSCRIBED_ALL_TEXT).markdown())]);
        }

        let task: Task = answer(answers, "task")?;
        let lang: Language = answer(answers, "lang")?;
        let removed = self.store.remove_sub(ctx.chat_id, task, lang)?;
        if !self.jobs.unschedule(ctx.chat_id, &removed) {
            tracing::warn!(chat_id = %ctx.chat_id, task = %task, lang = %lang, "No job was scheduled");
        }
        tracing::info!(chat_id = %ctx.chat_id, task = %task, lang = %lang, "Unsubscribed");

        Ok(vec![Effect::render(
            Screen::text(format!(
                "❌ *Unsubscribed from:* {} {}",
                task.display_name(),
                lang.emoji()
            ))
            .markdown(),
        )])
    }
}

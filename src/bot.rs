//! Routes inbound chat events to dialogues, one-shot commands and the
//! exercise checker

use crate::conversations::{
    subscription_label, EditConversation, SubscribeConversation, UnsubscribeConversation,
    NO_SUBSCRIPTIONS_TEXT,
};
use crate::drill::{Exercises, Language, Task};
use crate::runtime::{deliver, ChatTransport, ConversationEngine, APOLOGY_TEXT};
use crate::scheduler::{JobControl, Scheduler};
use crate::state_machine::{
    ChatId, Conversation, DefinitionError, Effect, InboundEvent, Payload, Screen,
};
use crate::store::SubscriptionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Command menu published to the chat client
pub const COMMANDS: &[(&str, &str)] = &[
    ("subscribe", "Subscribe to a daily task"),
    ("unsubscribe", "Unsubscribe from a task"),
    ("edit", "Change the settings of a subscription"),
    ("list", "Show your subscriptions"),
    ("test", "Get a task right now: /test <task> [DE|EN]"),
    ("help", "Show the available commands"),
];

pub const NO_DIALOGUE_TEXT: &str = "No active dialogue";
pub const TEST_USAGE_TEXT: &str = "Usage: /test <numbers|verbs> [DE|EN]";

/// The bot: three dialogue engines plus the stateless commands
pub struct Bot<T: ChatTransport + 'static> {
    transport: Arc<T>,
    engines: Vec<Arc<ConversationEngine<T>>>,
    store: Arc<SubscriptionStore>,
    scheduler: Scheduler<T>,
    exercises: Arc<Exercises>,
}

impl<T: ChatTransport + 'static> Bot<T> {
    pub fn new(
        transport: Arc<T>,
        store: Arc<SubscriptionStore>,
        scheduler: Scheduler<T>,
        exercises: Arc<Exercises>,
        conversation_timeout: Option<Duration>,
    ) -> Result<Self, DefinitionError> {
        let jobs: Arc<dyn JobControl> = Arc::new(scheduler.clone());
        let conversations: Vec<Arc<dyn Conversation>> = vec![
            Arc::new(
                SubscribeConversation::new(Arc::clone(&store), Arc::clone(&jobs))
                    .with_timeout(conversation_timeout),
            ),
            Arc::new(
                UnsubscribeConversation::new(Arc::clone(&store), Arc::clone(&jobs))
                    .with_timeout(conversation_timeout),
            ),
            Arc::new(
                EditConversation::new(Arc::clone(&store), jobs)
                    .with_timeout(conversation_timeout),
            ),
        ];
        let engines = conversations
            .into_iter()
            .map(|c| ConversationEngine::new(c, Arc::clone(&transport)).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            transport,
            engines,
            store,
            scheduler,
            exercises,
        })
    }

    /// Engines to hand to the session reaper
    pub fn engines(&self) -> Vec<Arc<ConversationEngine<T>>> {
        self.engines.clone()
    }

    /// Handle events until the sender side closes
    pub async fn run(&self, mut rx: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(&event).await;
        }
        tracing::info!("Event channel closed");
    }

    pub async fn handle(&self, event: &InboundEvent) {
        match &event.payload {
            Payload::Command { name, args } => self.command(event, name, args).await,
            Payload::Text(text) => {
                if !self.dispatch(event).await {
                    let screen = self.exercises.check(event.chat_id, text);
                    self.reply(event.chat_id, &screen).await;
                }
            }
            Payload::Button(data) => {
                if !self.dispatch(event).await {
                    tracing::debug!(chat_id = %event.chat_id, data = %data, "Button without dialogue");
                    deliver(
                        self.transport.as_ref(),
                        event,
                        vec![Effect::notice(NO_DIALOGUE_TEXT)],
                    )
                    .await;
                }
            }
        }
    }

    /// Offer the event to each live dialogue; true once one takes it
    async fn dispatch(&self, event: &InboundEvent) -> bool {
        for engine in &self.engines {
            if engine.dispatch(event).await.is_handled() {
                return true;
            }
        }
        false
    }

    async fn command(&self, event: &InboundEvent, name: &str, args: &[String]) {
        let chat_id = event.chat_id;
        if let Some(engine) = self.engines.iter().find(|e| e.command() == name) {
            // One dialogue per chat: opening one drops any other in progress
            for other in self.engines.iter().filter(|e| !Arc::ptr_eq(e, engine)) {
                other.end(chat_id).await;
            }
            engine.start(event).await;
            return;
        }

        let screen = match name {
            "list" => self.list(chat_id),
            "test" => self.test(chat_id, args).await,
            "start" | "help" => Some(help_screen()),
            _ => Some(Screen::text(format!(
                "Unknown command: /{name}\n\n{}",
                help_screen().text
            ))),
        };
        if let Some(screen) = screen {
            self.reply(chat_id, &screen).await;
        }
    }

    fn list(&self, chat_id: ChatId) -> Option<Screen> {
        let subs = match self.store.get_subs(chat_id) {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(chat_id = %chat_id, error = %e, "Failed to read subscriptions");
                return Some(Screen::text(APOLOGY_TEXT));
            }
        };
        if subs.is_empty() {
            return Some(Screen::text(NO_SUBSCRIPTIONS_TEXT));
        }

        let labels: Vec<String> = subs.iter().map(subscription_label).collect();
        Some(Screen::text(format!(
            "You are currently subscribed to:\n\n{}",
            labels.join("\n")
        )))
    }

    /// `/test <task> [lang]`; the drill itself is the reply
    async fn test(&self, chat_id: ChatId, args: &[String]) -> Option<Screen> {
        let Some(Ok(task)) = args.first().map(|a| a.parse::<Task>()) else {
            return Some(Screen::text(TEST_USAGE_TEXT));
        };
        let lang = match args.get(1).map(|a| a.parse::<Language>()) {
            None => Language::De,
            Some(Ok(lang)) => lang,
            Some(Err(_)) => return Some(Screen::text(TEST_USAGE_TEXT)),
        };

        match self.scheduler.run_now(chat_id, task, lang).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, task = %task, error = %e, "Test delivery failed");
                Some(Screen::text(APOLOGY_TEXT))
            }
        }
    }

    async fn reply(&self, chat_id: ChatId, screen: &Screen) {
        if let Err(e) = self.transport.send(chat_id, screen).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to send reply");
        }
    }
}

fn help_screen() -> Screen {
    let lines: Vec<String> = COMMANDS
        .iter()
        .map(|(command, description)| format!("/{command} - {description}"))
        .collect();
    Screen::text(format!("Available commands:\n\n{}", lines.join("\n")))
}

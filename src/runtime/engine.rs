//! Per-conversation session store and step dispatch

use super::deliver;
use super::traits::ChatTransport;
use crate::state_machine::navigation::{self, Navigation, CANCELED_TEXT, NOTHING_TO_UNDO_TEXT};
use crate::state_machine::{
    transition, ChatId, Conversation, DefinitionError, Effect, FinalizeContext, InboundEvent,
    Screen, Selection, Session, Snapshot, StateTable, Step, StepIndex, Transition,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Shown when a step or finalize hook fails
pub const APOLOGY_TEXT: &str = "Sorry, something went wrong. Please try again.";

type SessionSlot = Arc<tokio::sync::Mutex<Session>>;

/// What happened to an event handed to an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Session is waiting at the given landing state
    Waiting(StepIndex),
    /// Finalize hook ran and the session is gone
    Finalized,
    /// Session ended without finalizing
    Ended,
    Cancelled,
    /// No live session for the chat
    NoSession,
    /// Live session, but no handler at the current state accepts the event
    Unmatched,
    /// A step or hook failed; the user got an apology
    Failed,
}

impl DispatchOutcome {
    /// Whether the engine took responsibility for the event
    pub fn is_handled(self) -> bool {
        !matches!(self, DispatchOutcome::NoSession | DispatchOutcome::Unmatched)
    }
}

/// Runs one conversation definition for any number of chats.
///
/// Sessions are keyed by chat. Events for the same chat are serialized on the
/// session lock; different chats proceed independently.
pub struct ConversationEngine<T: ChatTransport> {
    conversation: Arc<dyn Conversation>,
    table: StateTable,
    transport: Arc<T>,
    timeout: Option<Duration>,
    sessions: Mutex<HashMap<ChatId, SessionSlot>>,
}

impl<T: ChatTransport> ConversationEngine<T> {
    pub fn new(
        conversation: Arc<dyn Conversation>,
        transport: Arc<T>,
    ) -> Result<Self, DefinitionError> {
        let table = StateTable::build(Arc::clone(&conversation).steps())?;
        let timeout = conversation.timeout();
        tracing::debug!(
            command = conversation.command(),
            steps = table.steps(),
            "Built conversation table"
        );
        Ok(Self {
            conversation,
            table,
            transport,
            timeout,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the conversation's own inactivity limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn command(&self) -> &str {
        self.conversation.command()
    }

    /// Begin (or restart) the conversation for the event's chat
    pub async fn start(&self, event: &InboundEvent) -> DispatchOutcome {
        let chat_id = event.chat_id;
        loop {
            let slot = self.slot_or_insert(chat_id);
            let mut session = slot.lock().await;
            if session.is_closed() {
                // Torn down while we waited for the lock
                continue;
            }
            if session.current != StepIndex::Entry {
                tracing::info!(chat_id = %chat_id, command = self.command(), "Restarting conversation");
            }
            session.reset(Instant::now());
            let outcome = self
                .run_step(&slot, &mut session, self.table.entry(), event)
                .await;
            // Nothing matches at Entry, so a failed entry would never be dispatched
            if outcome == DispatchOutcome::Failed && !session.is_closed() {
                self.teardown(&slot, &mut session, chat_id);
            }
            return outcome;
        }
    }

    /// Drop the chat's session without finalizing; true if one was live
    pub async fn end(&self, chat_id: ChatId) -> bool {
        let Some(slot) = self.slot(chat_id) else {
            return false;
        };
        let mut session = slot.lock().await;
        if session.is_closed() {
            return false;
        }
        self.teardown(&slot, &mut session, chat_id);
        tracing::info!(chat_id = %chat_id, command = self.command(), "Conversation superseded");
        true
    }

    /// Route an event to the chat's live session, if any
    pub async fn dispatch(&self, event: &InboundEvent) -> DispatchOutcome {
        let chat_id = event.chat_id;
        let Some(slot) = self.slot(chat_id) else {
            return DispatchOutcome::NoSession;
        };
        let mut session = slot.lock().await;
        if session.is_closed() {
            return DispatchOutcome::NoSession;
        }
        if session.is_expired(self.timeout, Instant::now()) {
            tracing::info!(chat_id = %chat_id, command = self.command(), "Conversation timed out");
            self.teardown(&slot, &mut session, chat_id);
            return DispatchOutcome::NoSession;
        }

        match self.table.select(session.current, event) {
            Selection::Navigation(data) => self.navigate(&slot, &mut session, data, event).await,
            Selection::Step(step) => self.run_step(&slot, &mut session, step, event).await,
            Selection::None => {
                tracing::debug!(
                    chat_id = %chat_id,
                    command = self.command(),
                    current = %session.current,
                    "No handler for event"
                );
                DispatchOutcome::Unmatched
            }
        }
    }

    /// Drop sessions idle past the timeout
    pub async fn reap_expired(&self) -> usize {
        self.reap_expired_at(Instant::now()).await
    }

    pub async fn reap_expired_at(&self, now: Instant) -> usize {
        if self.timeout.is_none() {
            return 0;
        }
        let mut reaped = 0;
        for (chat_id, slot) in self.slots() {
            let mut session = slot.lock().await;
            if !session.is_closed() && session.is_expired(self.timeout, now) {
                self.teardown(&slot, &mut session, chat_id);
                tracing::info!(chat_id = %chat_id, command = self.command(), "Conversation timed out");
                reaped += 1;
            }
        }
        reaped
    }

    async fn run_step(
        &self,
        slot: &SessionSlot,
        session: &mut Session,
        step: &Step,
        event: &InboundEvent,
    ) -> DispatchOutcome {
        let chat_id = event.chat_id;
        let from = session.current;

        // Handlers work on a copy so a failure leaves the session untouched
        let mut answers = session.answers.clone();
        let reply = match step.run(event, &mut answers) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    chat_id = %chat_id,
                    command = self.command(),
                    step = %from,
                    error = %e,
                    "Step failed"
                );
                self.apologize(event).await;
                return DispatchOutcome::Failed;
            }
        };
        let next = match transition(&self.table, from, reply.outcome) {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(
                    chat_id = %chat_id,
                    command = self.command(),
                    error = %e,
                    "Invalid transition"
                );
                self.apologize(event).await;
                return DispatchOutcome::Failed;
            }
        };

        session.answers = answers;
        // Re-prompting the same state keeps the screen it was entered with
        let reprompt = matches!((from, next), (StepIndex::At(a), Transition::MoveTo(b)) if a == b);
        if !reprompt {
            let shown = session
                .prompt
                .take()
                .unwrap_or_else(|| event.rendered.clone());
            session.history.push(Snapshot {
                index: from,
                screen: shown,
            });
            session.prompt = last_screen(&reply.effects);
        }
        session.touch(Instant::now());
        tracing::debug!(
            chat_id = %chat_id,
            command = self.command(),
            step = %from,
            outcome = ?reply.outcome,
            "Step completed"
        );

        let mut effects = reply.effects;
        let outcome = match next {
            Transition::MoveTo(n) => {
                session.current = StepIndex::At(n);
                DispatchOutcome::Waiting(session.current)
            }
            Transition::Terminate => {
                self.teardown(slot, session, chat_id);
                tracing::info!(chat_id = %chat_id, command = self.command(), "Conversation ended");
                DispatchOutcome::Ended
            }
            Transition::Finalize => {
                let ctx = FinalizeContext { chat_id };
                let result = self
                    .conversation
                    .process_result(&ctx, &session.answers)
                    .await;
                self.teardown(slot, session, chat_id);
                match result {
                    Ok(more) => {
                        effects.extend(more);
                        tracing::info!(chat_id = %chat_id, command = self.command(), "Conversation finalized");
                        DispatchOutcome::Finalized
                    }
                    Err(e) => {
                        tracing::error!(
                            chat_id = %chat_id,
                            command = self.command(),
                            error = %e,
                            "Finalize failed"
                        );
                        effects.push(Effect::render_text(APOLOGY_TEXT));
                        DispatchOutcome::Failed
                    }
                }
            }
        };

        deliver(self.transport.as_ref(), event, effects).await;
        outcome
    }

    async fn navigate(
        &self,
        slot: &SessionSlot,
        session: &mut Session,
        data: &str,
        event: &InboundEvent,
    ) -> DispatchOutcome {
        let chat_id = event.chat_id;
        let (effects, outcome) = match navigation::control(session, data) {
            Navigation::Cancel => {
                self.teardown(slot, session, chat_id);
                tracing::info!(chat_id = %chat_id, command = self.command(), "Conversation cancelled");
                (
                    vec![Effect::render_text(CANCELED_TEXT)],
                    DispatchOutcome::Cancelled,
                )
            }
            Navigation::Back(snapshot) => {
                tracing::debug!(chat_id = %chat_id, command = self.command(), to = %snapshot.index, "Went back");
                session.prompt = Some(snapshot.screen.clone());
                session.touch(Instant::now());
                (
                    vec![Effect::Render(snapshot.screen)],
                    DispatchOutcome::Waiting(session.current),
                )
            }
            Navigation::NothingToUndo => (
                vec![Effect::notice(NOTHING_TO_UNDO_TEXT)],
                DispatchOutcome::Waiting(session.current),
            ),
            Navigation::Ignored => (vec![], DispatchOutcome::Waiting(session.current)),
        };
        deliver(self.transport.as_ref(), event, effects).await;
        outcome
    }

    async fn apologize(&self, event: &InboundEvent) {
        deliver(
            self.transport.as_ref(),
            event,
            vec![Effect::notice(APOLOGY_TEXT)],
        )
        .await;
    }

    /// Close the session and unregister it, unless a newer one took its place
    fn teardown(&self, slot: &SessionSlot, session: &mut Session, chat_id: ChatId) {
        session.close();
        let mut sessions = self.sessions();
        if sessions
            .get(&chat_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            sessions.remove(&chat_id);
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<ChatId, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, chat_id: ChatId) -> Option<SessionSlot> {
        self.sessions().get(&chat_id).cloned()
    }

    fn slot_or_insert(&self, chat_id: ChatId) -> SessionSlot {
        let mut sessions = self.sessions();
        let slot = sessions
            .entry(chat_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Session::new(Instant::now()))));
        Arc::clone(slot)
    }

    fn slots(&self) -> Vec<(ChatId, SessionSlot)> {
        self.sessions()
            .iter()
            .map(|(chat_id, slot)| (*chat_id, Arc::clone(slot)))
            .collect()
    }

    #[cfg(test)]
    pub async fn inspect(&self, chat_id: ChatId) -> Option<SessionView> {
        let slot = self.slot(chat_id)?;
        let session = slot.lock().await;
        Some(SessionView {
            current: session.current,
            answers: session.answers.clone(),
            history: session.history.iter().map(|s| s.index).collect(),
        })
    }
}

/// Screen the user is looking at after these effects
fn last_screen(effects: &[Effect]) -> Option<Screen> {
    effects.iter().rev().find_map(|effect| match effect {
        Effect::Render(screen) | Effect::Send(screen) => Some(screen.clone()),
        Effect::Notice(_) => None,
    })
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub current: StepIndex,
    pub answers: crate::state_machine::Answers,
    pub history: Vec<StepIndex>,
}

//! Contract implemented by concrete dialogues

use super::effect::Effect;
use super::event::ChatId;
use super::session::Answers;
use super::step::{Step, StepError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Who a finalize hook is committing answers for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeContext {
    pub chat_id: ChatId,
}

/// A multi-step dialogue definition
#[async_trait]
pub trait Conversation: Send + Sync + 'static {
    /// Command that starts (or restarts) the dialogue, without the slash
    fn command(&self) -> &str;

    /// Inactivity limit after which a session is dropped silently
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Registration table: one entry step plus the landing-state handlers.
    /// Called once, when the engine is built.
    fn steps(self: Arc<Self>) -> Vec<Step>;

    /// Commit the answers of a completed session. Runs exactly once per
    /// session that was not cancelled.
    async fn process_result(
        &self,
        ctx: &FinalizeContext,
        answers: &Answers,
    ) -> Result<Vec<Effect>, StepError>;
}

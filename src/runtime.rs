//! Runtime for executing conversations
//!
//! Owns the per-chat sessions of every conversation definition, feeds
//! inbound events through the state table and renders the resulting effects
//! through the chat transport.

mod engine;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use engine::{ConversationEngine, DispatchOutcome, APOLOGY_TEXT};
pub use traits::*;

use crate::state_machine::{Effect, InboundEvent, Screen};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Execute effects for the originator of `event`.
///
/// `Render` edits the message a button was pressed on and replies to typed
/// messages. Button presses are always acknowledged exactly once; the first
/// `Notice` rides on that acknowledgement.
pub async fn deliver<T: ChatTransport + ?Sized>(
    transport: &T,
    event: &InboundEvent,
    effects: Vec<Effect>,
) {
    let chat_id = event.chat_id;
    let mut acknowledged = false;

    for effect in effects {
        let result = match effect {
            Effect::Render(screen) => match (event.is_button(), event.message_id) {
                (true, Some(message_id)) => transport.edit(chat_id, message_id, &screen).await,
                _ => transport.send(chat_id, &screen).await,
            },
            Effect::Send(screen) => transport.send(chat_id, &screen).await,
            Effect::Notice(text) => match event.callback_id.as_deref() {
                Some(callback_id) if !acknowledged => {
                    acknowledged = true;
                    transport.acknowledge(callback_id, Some(&text)).await
                }
                _ => transport.send(chat_id, &Screen::text(text)).await,
            },
        };
        if let Err(e) = result {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to deliver effect");
        }
    }

    if let (Some(callback_id), false) = (event.callback_id.as_deref(), acknowledged) {
        if let Err(e) = transport.acknowledge(callback_id, None).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to acknowledge button");
        }
    }
}

/// Periodically drop sessions that outlived their inactivity limit
pub fn spawn_reaper<T: ChatTransport + 'static>(
    engines: Vec<Arc<ConversationEngine<T>>>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let reaped: usize = join_all(engines.iter().map(|engine| engine.reap_expired()))
                        .await
                        .into_iter()
                        .sum();
                    if reaped > 0 {
                        tracing::info!(reaped, "Expired conversations removed");
                    }
                }
            }
        }
        tracing::info!("Session reaper stopped");
    })
}

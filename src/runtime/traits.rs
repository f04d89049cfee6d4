//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the engine with mock implementations.

use crate::state_machine::{ChatId, Screen};
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a chat transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} failed: {description}")]
    Api { method: String, description: String },
}

/// Outbound side of the chat transport
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Show a new message
    async fn send(&self, chat_id: ChatId, screen: &Screen) -> Result<(), TransportError>;

    /// Replace an already shown message
    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: i64,
        screen: &Screen,
    ) -> Result<(), TransportError>;

    /// Acknowledge a button press, optionally with a short notice
    async fn acknowledge(
        &self,
        callback_id: &str,
        notice: Option<&str>,
    ) -> Result<(), TransportError>;
}

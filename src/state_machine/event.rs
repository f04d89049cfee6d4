//! Events that can reach a conversation

use super::effect::Screen;
use super::step::Trigger;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the chat that owns a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the user actually did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Free text that is not a bot command
    Text(String),
    /// Inline button press, carrying the button's callback data
    Button(String),
    /// `/name arg1 arg2`
    Command { name: String, args: Vec<String> },
}

impl Payload {
    /// Classify a typed message, splitting off bot commands.
    ///
    /// `/subscribe@SomeBot` is treated as `/subscribe`.
    pub fn from_text(text: &str) -> Self {
        let Some(rest) = text.strip_prefix('/') else {
            return Payload::Text(text.to_string());
        };
        let mut parts = rest.split_whitespace();
        let name = parts
            .next()
            .and_then(|n| n.split('@').next())
            .unwrap_or_default();
        if name.is_empty() {
            return Payload::Text(text.to_string());
        }
        Payload::Command {
            name: name.to_string(),
            args: parts.map(String::from).collect(),
        }
    }
}

/// A trigger delivered by the chat transport
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub payload: Payload,
    /// The message this event came from, as it was shown to the user.
    /// Captured in session history so "back" can restore it.
    pub rendered: Screen,
    /// Transport id of that message (needed to edit it in place)
    pub message_id: Option<i64>,
    /// Transport id of the button press (needs an acknowledgement)
    pub callback_id: Option<String>,
}

impl InboundEvent {
    /// A typed message; commands are recognised automatically
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            chat_id,
            payload: Payload::from_text(&text),
            rendered: Screen::text(text),
            message_id: None,
            callback_id: None,
        }
    }

    /// A button press on the message showing `rendered`
    pub fn button(chat_id: ChatId, data: impl Into<String>, rendered: Screen) -> Self {
        Self {
            chat_id,
            payload: Payload::Button(data.into()),
            rendered,
            message_id: None,
            callback_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }

    /// Trigger kind this event can fire; commands fire no step
    pub fn trigger(&self) -> Option<Trigger> {
        match self.payload {
            Payload::Text(_) => Some(Trigger::Text),
            Payload::Button(_) => Some(Trigger::Button),
            Payload::Command { .. } => None,
        }
    }

    /// Callback data of a button press
    pub fn discriminator(&self) -> Option<&str> {
        match &self.payload {
            Payload::Button(data) => Some(data),
            _ => None,
        }
    }

    /// Value part of `prefix:value` callback data
    pub fn button_value(&self) -> Option<&str> {
        self.discriminator()
            .and_then(|data| data.split_once(':'))
            .map(|(_, value)| value)
    }

    /// Body of a free-text message
    pub fn message_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_button(&self) -> bool {
        matches!(self.payload, Payload::Button(_))
    }
}

//! Bot API wire types

use crate::state_machine::{Button, ChatId, InboundEvent, Keyboard, ParseMode, Screen};
use serde::{Deserialize, Serialize};

/// Envelope of every Bot API reply
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        Self {
            inline_keyboard: keyboard
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineKeyboardButton {
                            text: button.label.clone(),
                            callback_data: Some(button.data.clone()),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

impl From<InlineKeyboardMarkup> for Keyboard {
    fn from(markup: InlineKeyboardMarkup) -> Self {
        Keyboard::new(
            markup
                .inline_keyboard
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .filter_map(|b| b.callback_data.map(|data| Button::new(b.text, data)))
                        .collect()
                })
                .collect(),
        )
    }
}

impl Message {
    /// What the user currently sees in this message
    fn screen(self) -> Screen {
        Screen {
            text: self.text.unwrap_or_default(),
            keyboard: self.reply_markup.map(Keyboard::from),
            parse_mode: ParseMode::Plain,
        }
    }
}

impl Update {
    /// Typed messages and button presses; everything else is skipped
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let data = query.data?;
            let message = query.message?;
            let chat_id = ChatId(message.chat.id);
            let message_id = message.message_id;
            return Some(
                InboundEvent::button(chat_id, data, message.screen())
                    .with_message_id(message_id)
                    .with_callback_id(query.id),
            );
        }
        let message = self.message?;
        let text = message.text?;
        Some(InboundEvent::text(ChatId(message.chat.id), text).with_message_id(message.message_id))
    }
}

fn parse_mode(mode: ParseMode) -> Option<&'static str> {
    match mode {
        ParseMode::Plain => None,
        ParseMode::Markdown => Some("Markdown"),
        ParseMode::Html => Some("HTML"),
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl<'a> SendMessage<'a> {
    pub fn new(chat_id: ChatId, screen: &'a Screen) -> Self {
        Self {
            chat_id: chat_id.0,
            text: &screen.text,
            parse_mode: parse_mode(screen.parse_mode),
            reply_markup: screen.keyboard.as_ref().map(InlineKeyboardMarkup::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EditMessageText<'a> {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl<'a> EditMessageText<'a> {
    pub fn new(chat_id: ChatId, message_id: i64, screen: &'a Screen) -> Self {
        Self {
            chat_id: chat_id.0,
            message_id,
            text: &screen.text,
            parse_mode: parse_mode(screen.parse_mode),
            reply_markup: screen.keyboard.as_ref().map(InlineKeyboardMarkup::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerCallbackQuery<'a> {
    pub callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct GetUpdates {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct BotCommand<'a> {
    pub command: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SetMyCommands<'a> {
    pub commands: Vec<BotCommand<'a>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Payload;
    use serde_json::json;

    fn update(value: serde_json::Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_message_event() {
        let event = update(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": {"id": -500, "type": "group"},
                "from": {"id": 7, "is_bot": false, "first_name": "A"},
                "date": 0,
                "text": "/test numbers de"
            }
        }))
        .into_event()
        .unwrap();

        assert_eq!(event.chat_id, ChatId(-500));
        assert_eq!(event.message_id, Some(10));
        assert_eq!(event.callback_id, None);
        assert!(matches!(event.payload, Payload::Command { ref name, .. } if name == "test"));
    }

    #[test]
    fn test_callback_event_keeps_rendered_screen() {
        let event = update(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 7, "is_bot": false, "first_name": "A"},
                "chat_instance": "x",
                "data": "lang:DE",
                "message": {
                    "message_id": 11,
                    "chat": {"id": 7, "type": "private"},
                    "date": 0,
                    "text": "Select the language for the task",
                    "reply_markup": {"inline_keyboard": [[
                        {"text": "🇩🇪 Deutsch", "callback_data": "lang:DE"},
                        {"text": "Docs", "url": "https://example.org"}
                    ]]}
                }
            }
        }))
        .into_event()
        .unwrap();

        assert_eq!(event.discriminator(), Some("lang:DE"));
        assert_eq!(event.message_id, Some(11));
        assert_eq!(event.callback_id.as_deref(), Some("cb1"));
        assert_eq!(event.rendered.text, "Select the language for the task");
        let keyboard = event.rendered.keyboard.unwrap();
        assert_eq!(keyboard.rows, vec![vec![Button::new("🇩🇪 Deutsch", "lang:DE")]]);
    }

    #[test]
    fn test_other_updates_are_skipped() {
        assert!(update(json!({"update_id": 3})).into_event().is_none());
        assert!(update(json!({
            "update_id": 4,
            "message": {"message_id": 1, "chat": {"id": 1}, "date": 0, "sticker": {}}
        }))
        .into_event()
        .is_none());
    }

    #[test]
    fn test_send_message_body() {
        let screen = Screen::text("*Hi*")
            .markdown()
            .with_keyboard(Keyboard::new(vec![vec![Button::new("Go", "task:verbs")]]));
        let body = serde_json::to_value(SendMessage::new(ChatId(5), &screen)).unwrap();
        assert_eq!(
            body,
            json!({
                "chat_id": 5,
                "text": "*Hi*",
                "parse_mode": "Markdown",
                "reply_markup": {"inline_keyboard": [[{"text": "Go", "callback_data": "task:verbs"}]]}
            })
        );

        let plain = serde_json::to_value(EditMessageText::new(ChatId(5), 9, &Screen::text("x")))
            .unwrap();
        assert_eq!(plain, json!({"chat_id": 5, "message_id": 9, "text": "x"}));
    }
}

//! Telegram Bot API client
//!
//! Long-polls `getUpdates` for messages and button presses and implements
//! [`ChatTransport`] on top of `sendMessage`, `editMessageText` and
//! `answerCallbackQuery`.

mod types;

use crate::runtime::{ChatTransport, TransportError};
use crate::state_machine::{ChatId, InboundEvent, Screen};
use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use types::{
    AnswerCallbackQuery, ApiResponse, BotCommand, EditMessageText, GetUpdates, SendMessage,
    SetMyCommands, Update,
};

const API_BASE: &str = "https://api.telegram.org";
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram Bot API over HTTPS
pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: String, poll_timeout: Duration) -> Result<Self, TransportError> {
        // Leave room for the long poll itself
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            token,
            poll_timeout,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response: ApiResponse<R> = self
            .client
            .post(self.api_url(method))
            .json(params)
            .send()
            .await?
            .json()
            .await?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Api {
                method: method.to_string(),
                description: response
                    .description
                    .unwrap_or_else(|| "no result".to_string()),
            }),
        }
    }

    /// Publish the command menu
    pub async fn set_commands(&self, commands: &[(&str, &str)]) -> Result<(), TransportError> {
        let body = SetMyCommands {
            commands: commands
                .iter()
                .map(|&(command, description)| BotCommand {
                    command,
                    description,
                })
                .collect(),
        };
        let _: IgnoredAny = self.call("setMyCommands", &body).await?;
        Ok(())
    }

    /// Forward inbound events to `tx` until the receiver goes away
    pub async fn listen(&self, tx: mpsc::Sender<InboundEvent>) {
        let mut offset: i64 = 0;
        tracing::info!("Telegram client listening for updates");

        loop {
            let request = GetUpdates {
                offset,
                timeout: self.poll_timeout.as_secs(),
                allowed_updates: &["message", "callback_query"],
            };
            let updates: Vec<Update> = match self.call("getUpdates", &request).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram poll error");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(event) = update.into_event() else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    tracing::info!("Event receiver closed; stopping poll loop");
                    return;
                }
            }
        }
    }
}

/// Editing a message to identical content is rejected by the API
fn is_not_modified(error: &TransportError) -> bool {
    matches!(error, TransportError::Api { description, .. } if description.contains("message is not modified"))
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send(&self, chat_id: ChatId, screen: &Screen) -> Result<(), TransportError> {
        let _: IgnoredAny = self
            .call("sendMessage", &SendMessage::new(chat_id, screen))
            .await?;
        Ok(())
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: i64,
        screen: &Screen,
    ) -> Result<(), TransportError> {
        let body = EditMessageText::new(chat_id, message_id, screen);
        match self.call::<_, IgnoredAny>("editMessageText", &body).await {
            Err(e) if !is_not_modified(&e) => Err(e),
            _ => Ok(()),
        }
    }

    async fn acknowledge(
        &self,
        callback_id: &str,
        notice: Option<&str>,
    ) -> Result<(), TransportError> {
        let body = AnswerCallbackQuery {
            callback_query_id: callback_id,
            text: notice,
        };
        let _: IgnoredAny = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

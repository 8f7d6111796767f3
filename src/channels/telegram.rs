//! Telegram channel — long-polls the Bot API and feeds updates into the
//! registration engine.
//!
//! Text messages and inline-button presses (`callback_query`) both become
//! plain text for [`RegistrationEngine::handle`]; the chat id is the user's
//! external id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::MessageSender;
use crate::config::TelegramConfig;
use crate::error::ChannelError;
use crate::registration::messages::INTERNAL_ERROR;
use crate::registration::{RegistrationEngine, Reply};
use crate::users::Channel;

/// Maximum message length for Telegram's sendMessage API, in characters.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Delay before retrying after a failed poll.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            bot_token: config.bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// Send a reply, attaching confirm/cancel buttons when asked.
    /// Long texts are split; the keyboard goes on the last chunk.
    pub async fn send_reply(&self, chat_id: &str, reply: &Reply) -> Result<(), ChannelError> {
        let chunks = split_message(&reply.text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let keyboard = reply.buttons.then(confirm_keyboard);

        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard.as_ref() } else { None };
            self.send_message_chunk(chat_id, chunk, markup).await?;
        }
        Ok(())
    }

    /// Send a single message chunk, HTML first with a plain-text fallback.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        reply_markup: Option<&Value>,
    ) -> Result<(), ChannelError> {
        let mut html_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML"
        });
        if let Some(markup) = reply_markup {
            html_body["reply_markup"] = markup.clone();
        }

        let html_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&html_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if html_resp.status().is_success() {
            return Ok(());
        }

        let html_status = html_resp.status();
        tracing::warn!(
            status = ?html_status,
            "Telegram sendMessage with HTML failed; retrying without parse_mode"
        );

        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            plain_body["reply_markup"] = markup.clone();
        }
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage failed (html: {html_status}, plain: {plain_err})"),
            });
        }

        Ok(())
    }

    /// Stop the button's loading spinner.
    async fn answer_callback_query(&self, callback_id: &str) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url("answerCallbackQuery"))
            .json(&serde_json::json!({ "callback_query_id": callback_id }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("answerCallbackQuery returned {}", resp.status()),
            });
        }
        Ok(())
    }

    /// Verify the token with `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    /// Spawn the long-poll loop. Updates are handled one at a time, so a
    /// single chat never has two messages in flight.
    pub fn start(self: Arc<Self>, engine: Arc<RegistrationEngine>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match self
                    .client
                    .post(self.api_url("getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_BACKOFF).await;
                        continue;
                    }
                };

                let status = resp.status();
                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!(%status, "Telegram parse error: {e}");
                        tokio::time::sleep(POLL_BACKOFF).await;
                        continue;
                    }
                };

                let results = match update_batch(&data) {
                    Ok(results) => results,
                    Err(e) => {
                        tracing::warn!(%status, "Telegram poll rejected: {e}");
                        tokio::time::sleep(POLL_BACKOFF).await;
                        continue;
                    }
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(inbound) = parse_update(update) else {
                        continue;
                    };

                    if let Some(ref callback_id) = inbound.callback_id {
                        if let Err(e) = self.answer_callback_query(callback_id).await {
                            tracing::debug!("answerCallbackQuery failed: {e}");
                        }
                    }

                    self.dispatch(&engine, &inbound).await;
                }
            }
        })
    }

    async fn dispatch(&self, engine: &RegistrationEngine, inbound: &InboundUpdate) {
        let reply = match engine
            .handle(Channel::Telegram, &inbound.chat_id, &inbound.text)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(chat_id = %inbound.chat_id, "Failed to handle Telegram message: {e}");
                Reply::text(INTERNAL_ERROR)
            }
        };

        if let Err(e) = self.send_reply(&inbound.chat_id, &reply).await {
            tracing::warn!(chat_id = %inbound.chat_id, "Telegram reply failed: {e}");
        }
    }
}

#[async_trait]
impl MessageSender for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(recipient, &chunk, None).await?;
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// The parts of an update the registration flow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InboundUpdate {
    chat_id: String,
    text: String,
    /// Set for inline-button presses, which must be acknowledged.
    callback_id: Option<String>,
}

/// The update list from a `getUpdates` body, or the API's error description.
fn update_batch(data: &Value) -> Result<&[Value], String> {
    if data.get("ok").and_then(Value::as_bool) != Some(true) {
        let code = data
            .get("error_code")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let description = data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        return Err(format!("error {code}: {description}"));
    }
    data.get("result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| "response has no result".to_string())
}

/// Extract chat id and text from a `message` or `callback_query` update.
fn parse_update(update: &Value) -> Option<InboundUpdate> {
    if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)?;
        return Some(InboundUpdate {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            callback_id: None,
        });
    }

    let query = update.get("callback_query")?;
    let data = query.get("data").and_then(Value::as_str)?;
    let chat_id = query
        .get("message")
        .and_then(|m| m.get("chat"))
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)?;
    Some(InboundUpdate {
        chat_id: chat_id.to_string(),
        text: data.to_string(),
        callback_id: query
            .get("id")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

/// Inline keyboard for the confirmation step.
fn confirm_keyboard() -> Value {
    serde_json::json!({
        "inline_keyboard": [[
            { "text": "✅ Подтвердить", "callback_data": "confirm" },
            { "text": "❌ Отменить", "callback_data": "cancel" }
        ]]
    })
}

/// Split a message into chunks of at most `max_chars` characters.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        // Byte offset of the first character past the limit.
        let Some((limit, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
        if remaining.is_empty() {
            break;
        }
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

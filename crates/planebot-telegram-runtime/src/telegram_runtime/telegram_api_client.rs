//! Telegram Bot API client used by the polling loop and report delivery.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use planebot_core::ChatId;
use planebot_transport::{ensure_success, send_with_retry, RetryPolicy};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::telegram_message_chunks::{split_message_for_telegram, TELEGRAM_MAX_MESSAGE_CHARS};

const SERVICE_NAME: &str = "telegram";
const MARKDOWN_V2: &str = "MarkdownV2";

#[derive(Debug, Clone, Deserialize)]
struct TelegramEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct TelegramUser {
    pub(super) id: i64,
    #[serde(default)]
    pub(super) is_bot: bool,
    pub(super) username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct TelegramChat {
    pub(super) id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct TelegramMessage {
    pub(super) message_id: i64,
    pub(super) chat: TelegramChat,
    pub(super) from: Option<TelegramUser>,
    pub(super) text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct TelegramUpdate {
    pub(super) update_id: i64,
    pub(super) message: Option<TelegramMessage>,
}

impl TelegramMessage {
    pub(super) fn chat_id(&self) -> ChatId {
        ChatId::from(self.chat.id.to_string())
    }
}

#[derive(Clone)]
/// Public struct `TelegramApiClient` wrapping the Bot API methods the bridge uses.
pub struct TelegramApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl TelegramApiClient {
    pub fn new(
        api_base: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let bot_token = bot_token.trim().to_string();
        if bot_token.is_empty() {
            bail!("telegram bot token cannot be empty");
        }
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("planebot-telegram-bridge"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let request_timeout = Duration::from_millis(request_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create telegram api client")?;
        Ok(Self {
            http,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            bot_token,
            request_timeout,
            retry: RetryPolicy::new(retry_max_attempts, retry_base_delay_ms),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    pub(super) async fn get_me(&self) -> Result<TelegramUser> {
        let url = self.method_url("getMe");
        self.call("getMe", || self.http.get(&url).timeout(self.request_timeout))
            .await
    }

    /// Long-polls for updates starting at `offset`. The HTTP timeout is
    /// extended by the poll timeout so a quiet chat is not treated as a failure.
    pub(super) async fn get_updates(
        &self,
        offset: Option<i64>,
        poll_timeout_seconds: u64,
    ) -> Result<Vec<TelegramUpdate>> {
        let url = self.method_url("getUpdates");
        let timeout = self.request_timeout + Duration::from_secs(poll_timeout_seconds);
        let mut query = vec![
            ("timeout", poll_timeout_seconds.to_string()),
            ("allowed_updates", "[\"message\"]".to_string()),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        self.call("getUpdates", || {
            self.http.get(&url).query(&query).timeout(timeout)
        })
        .await
    }

    /// Sends `text` as MarkdownV2, split into several messages when it is too
    /// long. Only the first message replies to `reply_to_message_id`.
    pub async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Result<Vec<i64>> {
        let url = self.method_url("sendMessage");
        let chunks = split_message_for_telegram(text, TELEGRAM_MAX_MESSAGE_CHARS);
        let mut message_ids = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let mut payload = json!({
                "chat_id": chat_id.as_str(),
                "text": chunk,
                "parse_mode": MARKDOWN_V2,
                "disable_web_page_preview": true,
            });
            if let (0, Some(message_id)) = (index, reply_to_message_id) {
                payload["reply_to_message_id"] = Value::from(message_id);
                payload["allow_sending_without_reply"] = Value::Bool(true);
            }
            let sent: TelegramMessage = self
                .call("sendMessage", || {
                    self.http
                        .post(&url)
                        .timeout(self.request_timeout)
                        .json(&payload)
                })
                .await
                .with_context(|| {
                    format!(
                        "failed to send message part {}/{} to chat {chat_id}",
                        index + 1,
                        chunks.len()
                    )
                })?;
            message_ids.push(sent.message_id);
        }
        tracing::debug!(chat_id = %chat_id, parts = message_ids.len(), "telegram message sent");
        Ok(message_ids)
    }

    async fn call<T, F>(&self, method: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = send_with_retry(SERVICE_NAME, method, self.retry, build).await?;
        let status = response.status();
        if status.is_client_error() {
            // Bot API errors carry their reason in the JSON envelope.
            let body = response.text().await.unwrap_or_default();
            if let Ok(envelope) = serde_json::from_str::<TelegramEnvelope<Value>>(&body) {
                bail!(
                    "telegram api {method} failed with status {}: {}",
                    status.as_u16(),
                    envelope
                        .description
                        .unwrap_or_else(|| "no description".to_string())
                );
            }
            bail!(
                "telegram api {method} failed with status {}: {}",
                status.as_u16(),
                planebot_transport::truncate_for_error(&body, 800)
            );
        }
        let response = ensure_success(SERVICE_NAME, method, response).await?;
        let envelope: TelegramEnvelope<T> = response
            .json()
            .await
            .with_context(|| format!("failed to decode telegram api {method} response"))?;
        if !envelope.ok {
            bail!(
                "telegram api {method} returned ok=false: {}",
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string())
            );
        }
        envelope
            .result
            .ok_or_else(|| anyhow!("telegram api {method} response missing result"))
    }
}

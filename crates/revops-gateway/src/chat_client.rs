//! `reqwest`-backed [`ChatClient`] implementation (spec §6 "Chat
//! ingress"), posting and updating messages against the chat platform's
//! HTTP API the way `machi-bot`'s channel clients speak to their own
//! platforms.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use revops_core::ingress::{ChatClient, ChatClientError};

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    thread_ts: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateMessageRequest<'a> {
    channel: &'a str,
    ts: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PlatformResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A chat-platform client addressing a single bot token and API base
/// URL (spec §6 `bot_token`).
pub struct HttpChatClient {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl HttpChatClient {
    /// Construct a client against `api_base`, authenticating with
    /// `bot_token`.
    #[must_use]
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        }
    }

    async fn call(&self, endpoint: &str, body: &impl Serialize) -> Result<PlatformResponse, ChatClientError> {
        let url = format!("{}/{endpoint}", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .timeout(revops_core::ingress::chat::CHAT_CALL_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    ChatClientError::Timeout
                } else {
                    ChatClientError::Failed(error.to_string())
                }
            })?;

        let parsed: PlatformResponse = response
            .json()
            .await
            .map_err(|error| ChatClientError::Failed(error.to_string()))?;

        if parsed.ok {
            Ok(parsed)
        } else {
            Err(ChatClientError::Failed(
                parsed.error.unwrap_or_else(|| "unknown platform error".into()),
            ))
        }
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn post_message(
        &self,
        channel_id: &str,
        thread_id: &str,
        text: &str,
    ) -> Result<String, ChatClientError> {
        let request = PostMessageRequest {
            channel: channel_id,
            thread_ts: thread_id,
            text,
        };
        let response = self.call("chat.postMessage", &request).await?;
        response
            .ts
            .ok_or_else(|| ChatClientError::Failed("platform response missing message ts".into()))
    }

    async fn update_message(
        &self,
        channel_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<(), ChatClientError> {
        let request = UpdateMessageRequest {
            channel: channel_id,
            ts: message_id,
            text,
        };
        self.call("chat.update", &request).await?;
        Ok(())
    }
}

//! Telegram notifier.
//!
//! Delivers settlement results to users via the Bot API. Messages sent
//! to a group chat are prefixed with a mention of the user so they see
//! the result among other traffic; the mention is a plain wrapping
//! function over the message text, applied just before delivery.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::Notifier;

const API_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Prefix `text` with an inline mention of the user.
pub fn with_mention(user_id: i64, name: &str, text: &str) -> String {
    format!("[{name}](tg://user?id={user_id})\n\n{text}")
}

// ---------------------------------------------------------------------------
// API response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    user: ChatUser,
}

#[derive(Debug, Deserialize)]
struct ChatUser {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, API_URL)
    }

    fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    /// Display name for a group member, best effort. Falls back to
    /// "User" when the lookup fails so the mention link still works.
    async fn member_name(&self, chat_id: i64, user_id: i64) -> String {
        let lookup: Result<ApiResponse<ChatMember>> = async {
            let resp = self
                .http
                .get(self.method_url("getChatMember"))
                .query(&[("chat_id", chat_id), ("user_id", user_id)])
                .send()
                .await
                .context("getChatMember request failed")?;
            resp.json().await.context("Failed to parse getChatMember")
        }
        .await;

        match lookup {
            Ok(ApiResponse {
                ok: true,
                result: Some(member),
                ..
            }) => member
                .user
                .username
                .or(member.user.first_name)
                .unwrap_or_else(|| "User".to_string()),
            _ => "User".to_string(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, user_id: i64, chat_id: Option<i64>, text: &str) -> Result<()> {
        let target = chat_id.unwrap_or(user_id);

        // Group delivery gets a mention prefix so the user is pinged.
        let text = match chat_id {
            Some(chat) if chat != user_id => {
                let name = self.member_name(chat, user_id).await;
                with_mention(user_id, &name, text)
            }
            _ => text.to_string(),
        };

        let response: ApiResponse<serde_json::Value> = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": target,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .context("sendMessage request failed")?
            .json()
            .await
            .context("Failed to parse sendMessage response")?;

        if !response.ok {
            return Err(anyhow!(
                "Telegram rejected the message: {}",
                response.description.unwrap_or_else(|| "no description".to_string())
            ));
        }

        debug!(target, "Notification delivered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

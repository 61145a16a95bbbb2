//! Slack Web API chat channel.
//!
//! Uses `chat.postMessage` with a bot token so messages can be threaded via
//! `thread_ts`. Requests are not retried.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatChannel, ThreadHandle};
use crate::error::ChannelError;

/// Environment variable for the Slack bot token.
const ENV_SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";

/// Environment variable for the target Slack channel.
const ENV_SLACK_CHANNEL: &str = "SLACK_CHANNEL";

/// Slack Web API base URL.
const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Fallback when a 429 carries no `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Slack chat channel.
pub struct SlackChannel {
    token: Option<String>,
    channel: String,
    api_base: String,
    client: reqwest::Client,
}

impl SlackChannel {
    /// Create a Slack channel. Without a token the channel is disabled.
    #[must_use]
    pub fn new(token: Option<String>, channel: impl Into<String>) -> Self {
        Self {
            token,
            channel: channel.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn enabled(&self) -> bool {
        self.token.is_some() && !self.channel.is_empty()
    }

    async fn post(
        &self,
        text: &str,
        thread: Option<&ThreadHandle>,
    ) -> Result<ThreadHandle, ChannelError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_SLACK_BOT_TOKEN.to_string()))?;
        if self.channel.is_empty() {
            return Err(ChannelError::NotConfigured(ENV_SLACK_CHANNEL.to_string()));
        }

        let payload = PostMessage {
            channel: &self.channel,
            text,
            thread_ts: thread.map(ThreadHandle::as_str),
        };

        debug!(
            channel = "slack",
            threaded = thread.is_some(),
            "Posting message"
        );

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ChannelError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "slack",
                status = %status,
                body = %body,
                "Slack request failed"
            );

            return Err(ChannelError::Other(format!(
                "Slack returned {status}: {body}"
            )));
        }

        let result: PostMessageResponse = response.json().await?;
        if !result.ok {
            let error = result.error.unwrap_or_else(|| "unknown_error".to_string());
            warn!(channel = "slack", error = %error, "Slack rejected message");
            return Err(ChannelError::Api(error));
        }

        if let Some(thread) = thread {
            return Ok(thread.clone());
        }

        result
            .ts
            .map(ThreadHandle)
            .ok_or_else(|| ChannelError::Api("response missing ts".to_string()))
    }
}

// =============================================================================
// Slack API types
// =============================================================================

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

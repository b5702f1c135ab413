//! Discord adapter (alert delivery).
//!
//! Posts one-line alerts to a channel over the Discord REST API. The
//! gateway/command side of the bot lives outside this service; only
//! delivery is needed here.

use async_trait::async_trait;
use sitewatch_core::{domain::ChannelId, errors::Error, notify::NotificationSink, Result};

const API_BASE: &str = "https://discord.com/api/v10";

#[derive(Clone, Debug)]
pub struct DiscordNotifier {
    bot_token: String,
    api_base: String,
    http: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_api_base(bot_token, API_BASE)
    }

    /// Test hook: point the client at a stand-in API server.
    pub fn with_api_base(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client build");
        Self {
            bot_token: bot_token.into(),
            api_base: api_base.into(),
            http,
        }
    }

    fn messages_url(&self, channel: ChannelId) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel.0)
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<()> {
        let body = serde_json::json!({ "content": text });

        let resp = self
            .http
            .post(self.messages_url(channel))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Notify(format!("discord request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Notify(format!(
                "discord send failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_url_targets_the_channel() {
        let notifier = DiscordNotifier::new("token");
        assert_eq!(
            notifier.messages_url(ChannelId(42)),
            "https://discord.com/api/v10/channels/42/messages"
        );
    }
}

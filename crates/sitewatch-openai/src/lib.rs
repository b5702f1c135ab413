//! OpenAI adapter (semantic change judgment).
//!
//! Asks the chat-completions endpoint whether the difference between two
//! page snapshots is meaningful to a reader, expecting a bare YES or NO
//! back. Anything else is handled fail-closed by the core classifier.

use std::time::Duration;

use async_trait::async_trait;
use sitewatch_core::{classify::SignificanceJudge, errors::Error, Result};

const API_BASE: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You compare two snapshots of the same web page and decide whether \
the difference matters to a human reader. Ignore cosmetic-only churn: rotating ads, timestamps, \
view counters, tracking artifacts, styling or script noise. Report substantive changes: \
headlines, prices, inventory, announcements, events. Answer with exactly YES or NO.";

#[derive(Clone, Debug)]
pub struct OpenAiJudge {
    api_key: String,
    model: String,
    api_base: String,
    http: reqwest::Client,
}

impl OpenAiJudge {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self::with_api_base(api_key, model, timeout, API_BASE)
    }

    /// Test hook: point the client at a stand-in API server.
    pub fn with_api_base(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        api_base: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_base: api_base.into(),
            http,
        }
    }
}

fn user_prompt(url: &str, previous: &str, current: &str) -> String {
    format!("URL: {url}\n\nPREVIOUS:\n{previous}\n\nCURRENT:\n{current}")
}

#[async_trait]
impl SignificanceJudge for OpenAiJudge {
    async fn judge(&self, url: &str, previous: &str, current: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "max_tokens": 3,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(url, previous, current) },
            ],
        });

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Classify(format!("openai request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Classify(format!(
                "openai judgment failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Classify(format!("openai json error: {e}")))?;

        let text = v
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .to_string();

        if text.trim().is_empty() {
            return Err(Error::Classify(
                "openai judgment returned empty text".to_string(),
            ));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_carries_both_snapshots() {
        let p = user_prompt("https://x.example", "old body", "new body");
        assert!(p.starts_with("URL: https://x.example"));
        assert!(p.contains("PREVIOUS:\nold body"));
        assert!(p.contains("CURRENT:\nnew body"));
    }
}

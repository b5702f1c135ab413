use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::{domain::ChannelId, Result};

/// Fire-and-forget alert delivery. A failed send is logged by the caller
/// and not retried within the current cycle.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<()>;
}

/// One-line alert for a detected change.
pub fn change_alert(url: &str, at: DateTime<Local>) -> String {
    format!("⚠️ {url} changed at {} (local time).", at.format("%H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn alert_carries_url_and_local_time() {
        let at = Local.with_ymd_and_hms(2026, 1, 1, 9, 5, 0).unwrap();
        let text = change_alert("https://x.example/news", at);
        assert_eq!(
            text,
            "⚠️ https://x.example/news changed at 09:05 (local time)."
        );
    }
}

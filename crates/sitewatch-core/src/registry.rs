use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChannelId, TenantId},
    errors::Error,
    Result,
};

/// Poll cadence used when a tenant never set one explicitly.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;

/// Per-tenant watch configuration plus last-seen snapshots.
///
/// This struct is also the on-disk shape: the field names below are the
/// JSON keys of the state file, and every key is individually optional on
/// load so partial or hand-edited files still parse.
///
/// Snapshots are keyed globally by URL, so removing a URL from one tenant
/// discards the snapshot even if another tenant still watches it; the other
/// tenant simply re-seeds its baseline on the next pass.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TenantRegistry {
    /// Watched URLs per tenant, in insertion order.
    #[serde(default)]
    watched_urls: HashMap<String, Vec<String>>,

    /// Last snapshot per URL. Absent until the first successful fetch.
    #[serde(default)]
    previous_content: HashMap<String, String>,

    /// Alert destination per tenant.
    #[serde(default)]
    notification_channels: HashMap<String, u64>,

    /// Poll interval in minutes per tenant (positive).
    #[serde(default)]
    monitoring_intervals: HashMap<String, u32>,
}

impl TenantRegistry {
    /// Adds a URL to the tenant's watch list.
    pub fn add_url(&mut self, tenant: &TenantId, url: &str) -> Result<()> {
        let urls = self.watched_urls.entry(tenant.0.clone()).or_default();
        if urls.iter().any(|u| u == url) {
            return Err(Error::AlreadyWatched(url.to_string()));
        }
        urls.push(url.to_string());
        Ok(())
    }

    /// Removes a URL from the tenant's watch list and discards its snapshot.
    pub fn remove_url(&mut self, tenant: &TenantId, url: &str) -> Result<()> {
        let Some(urls) = self.watched_urls.get_mut(&tenant.0) else {
            return Err(Error::NotWatched(url.to_string()));
        };
        let Some(pos) = urls.iter().position(|u| u == url) else {
            return Err(Error::NotWatched(url.to_string()));
        };
        urls.remove(pos);
        self.previous_content.remove(url);
        Ok(())
    }

    /// The tenant's watched URLs, in the order they were added.
    pub fn urls(&self, tenant: &TenantId) -> Vec<String> {
        self.watched_urls
            .get(&tenant.0)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_watched(&self, tenant: &TenantId, url: &str) -> bool {
        self.watched_urls
            .get(&tenant.0)
            .map(|urls| urls.iter().any(|u| u == url))
            .unwrap_or(false)
    }

    pub fn set_channel(&mut self, tenant: &TenantId, channel: ChannelId) {
        self.notification_channels.insert(tenant.0.clone(), channel.0);
    }

    pub fn channel(&self, tenant: &TenantId) -> Option<ChannelId> {
        self.notification_channels
            .get(&tenant.0)
            .copied()
            .map(ChannelId)
    }

    pub fn set_interval(&mut self, tenant: &TenantId, minutes: i64) -> Result<()> {
        if minutes < 1 {
            return Err(Error::InvalidInterval(minutes));
        }
        self.monitoring_intervals
            .insert(tenant.0.clone(), minutes as u32);
        Ok(())
    }

    /// Effective poll interval, falling back to [`DEFAULT_INTERVAL_MINUTES`].
    pub fn interval_minutes(&self, tenant: &TenantId) -> u32 {
        self.monitoring_intervals
            .get(&tenant.0)
            .copied()
            .unwrap_or(DEFAULT_INTERVAL_MINUTES)
    }

    pub fn snapshot(&self, url: &str) -> Option<&str> {
        self.previous_content.get(url).map(String::as_str)
    }

    pub fn record_snapshot(&mut self, url: &str, content: String) {
        self.previous_content.insert(url.to_string(), content);
    }

    /// Every tenant that ever ran a configuration command, sorted for
    /// deterministic iteration.
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut out: Vec<String> = self.watched_urls.keys().cloned().collect();
        out.sort();
        out.into_iter().map(TenantId).collect()
    }

    /// True when the three running-preconditions hold: a non-empty watch
    /// list, a destination, and a positive interval.
    pub fn ready_to_watch(&self, tenant: &TenantId) -> bool {
        self.watched_urls
            .get(&tenant.0)
            .map(|urls| !urls.is_empty())
            .unwrap_or(false)
            && self.channel(tenant).is_some()
            && self.interval_minutes(tenant) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::from("guild-1")
    }

    #[test]
    fn add_url_rejects_duplicates() {
        let mut reg = TenantRegistry::default();
        reg.add_url(&tenant(), "https://a.example").unwrap();
        let err = reg.add_url(&tenant(), "https://a.example").unwrap_err();
        assert!(matches!(err, Error::AlreadyWatched(_)));
        assert_eq!(reg.urls(&tenant()).len(), 1);
    }

    #[test]
    fn urls_keep_insertion_order() {
        let mut reg = TenantRegistry::default();
        reg.add_url(&tenant(), "https://b.example").unwrap();
        reg.add_url(&tenant(), "https://a.example").unwrap();
        reg.add_url(&tenant(), "https://c.example").unwrap();
        assert_eq!(
            reg.urls(&tenant()),
            vec!["https://b.example", "https://a.example", "https://c.example"]
        );
    }

    #[test]
    fn remove_url_rejects_unknown() {
        let mut reg = TenantRegistry::default();
        let err = reg.remove_url(&tenant(), "https://a.example").unwrap_err();
        assert!(matches!(err, Error::NotWatched(_)));

        reg.add_url(&tenant(), "https://a.example").unwrap();
        let err = reg.remove_url(&tenant(), "https://b.example").unwrap_err();
        assert!(matches!(err, Error::NotWatched(_)));
    }

    #[test]
    fn remove_url_discards_snapshot() {
        let mut reg = TenantRegistry::default();
        reg.add_url(&tenant(), "https://a.example").unwrap();
        reg.record_snapshot("https://a.example", "body".to_string());
        assert_eq!(reg.snapshot("https://a.example"), Some("body"));

        reg.remove_url(&tenant(), "https://a.example").unwrap();
        assert_eq!(reg.snapshot("https://a.example"), None);
        assert!(reg.urls(&tenant()).is_empty());
    }

    #[test]
    fn set_interval_rejects_non_positive() {
        let mut reg = TenantRegistry::default();
        assert!(matches!(
            reg.set_interval(&tenant(), 0),
            Err(Error::InvalidInterval(0))
        ));
        assert!(matches!(
            reg.set_interval(&tenant(), -5),
            Err(Error::InvalidInterval(-5))
        ));
        assert_eq!(reg.interval_minutes(&tenant()), DEFAULT_INTERVAL_MINUTES);

        reg.set_interval(&tenant(), 15).unwrap();
        assert_eq!(reg.interval_minutes(&tenant()), 15);
    }

    #[test]
    fn ready_to_watch_requires_all_preconditions() {
        let mut reg = TenantRegistry::default();
        assert!(!reg.ready_to_watch(&tenant()));

        reg.add_url(&tenant(), "https://a.example").unwrap();
        assert!(!reg.ready_to_watch(&tenant()));

        reg.set_channel(&tenant(), ChannelId(42));
        assert!(reg.ready_to_watch(&tenant()));

        reg.remove_url(&tenant(), "https://a.example").unwrap();
        assert!(!reg.ready_to_watch(&tenant()));
    }

    #[test]
    fn state_file_keys_round_trip() {
        let raw = r#"{
            "watched_urls": { "guild-1": ["https://a.example"] },
            "previous_content": { "https://a.example": "body" },
            "notification_channels": { "guild-1": 42 },
            "monitoring_intervals": { "guild-1": 10 }
        }"#;
        let reg: TenantRegistry = serde_json::from_str(raw).unwrap();
        assert_eq!(reg.urls(&tenant()), vec!["https://a.example"]);
        assert_eq!(reg.snapshot("https://a.example"), Some("body"));
        assert_eq!(reg.channel(&tenant()), Some(ChannelId(42)));
        assert_eq!(reg.interval_minutes(&tenant()), 10);

        let json = serde_json::to_string(&reg).unwrap();
        for key in [
            "watched_urls",
            "previous_content",
            "notification_channels",
            "monitoring_intervals",
        ] {
            assert!(json.contains(key), "missing key {key}");
        }
    }

    #[test]
    fn partial_state_file_parses() {
        let reg: TenantRegistry = serde_json::from_str("{}").unwrap();
        assert!(reg.tenants().is_empty());

        let reg: TenantRegistry =
            serde_json::from_str(r#"{ "watched_urls": { "g": [] } }"#).unwrap();
        assert_eq!(reg.tenants(), vec![TenantId::from("g")]);
    }
}

//! Per-tenant watch scheduling.
//!
//! One cooperative loop per tenant: run a poll pass, sleep until the next
//! clock-aligned wake instant, repeat. Loops are started and stopped only
//! through [`MonitorScheduler`], which guarantees at most one live loop per
//! tenant and re-evaluates loop eligibility after every configuration
//! change.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Local, Timelike};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    classify::{ChangeClassifier, Verdict},
    domain::{ChannelId, TenantId},
    fetch::ContentFetcher,
    notify::{change_alert, NotificationSink},
    registry::TenantRegistry,
    store::PersistenceStore,
    Result,
};

/// Outcome of an `add_url` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddedWatch {
    /// False when the seed fetch failed; the first successful pass fetch
    /// establishes the baseline instead.
    pub baseline_established: bool,
}

#[derive(Clone)]
pub struct MonitorScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    fetcher: Arc<dyn ContentFetcher>,
    classifier: Arc<dyn ChangeClassifier>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn PersistenceStore>,
    registry: tokio::sync::Mutex<TenantRegistry>,
    loops: tokio::sync::Mutex<HashMap<TenantId, LoopEntry>>,
}

struct LoopEntry {
    enabled: Arc<AtomicBool>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl LoopEntry {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl MonitorScheduler {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        classifier: Arc<dyn ChangeClassifier>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                fetcher,
                classifier,
                sink,
                store,
                registry: tokio::sync::Mutex::new(TenantRegistry::default()),
                loops: tokio::sync::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Load the persisted registry and start a loop for every tenant whose
    /// running-preconditions already hold. Returns the number started.
    pub async fn bootstrap(&self) -> Result<usize> {
        let loaded = self.inner.store.load().await?;
        let tenants = loaded.tenants();
        {
            let mut reg = self.inner.registry.lock().await;
            *reg = loaded;
        }

        let mut started = 0usize;
        for tenant in tenants {
            let (no_urls, no_channel, interval) = {
                let reg = self.inner.registry.lock().await;
                (
                    reg.urls(&tenant).is_empty(),
                    reg.channel(&tenant).is_none(),
                    reg.interval_minutes(&tenant),
                )
            };

            if no_urls {
                info!(tenant = %tenant, "no watched urls; not resuming");
            } else if no_channel {
                info!(tenant = %tenant, "no notification channel set; not resuming");
            } else if interval == 0 {
                warn!(tenant = %tenant, "stored interval is invalid; not resuming");
            } else if self.start(&tenant).await {
                started += 1;
            }
        }

        info!(started, "resumed persisted watches");
        Ok(started)
    }

    /// Spawn the tenant's poll loop. Returns false (no-op) when a loop is
    /// already live for that tenant. The loop itself re-validates the
    /// running-preconditions and exits with a diagnostic instead of polling
    /// when they do not hold.
    pub async fn start(&self, tenant: &TenantId) -> bool {
        let mut loops = self.inner.loops.lock().await;
        if let Some(entry) = loops.get(tenant) {
            if entry.is_live() {
                debug!(tenant = %tenant, "watch loop already running");
                return false;
            }
        }

        let enabled = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let scheduler = self.clone();
        let tenant_clone = tenant.clone();
        let enabled_clone = enabled.clone();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            scheduler
                .watch_loop(tenant_clone, enabled_clone, cancel_clone)
                .await;
        });

        loops.insert(
            tenant.clone(),
            LoopEntry {
                enabled,
                cancel,
                handle,
            },
        );
        true
    }

    /// Signal cancellation to the tenant's active loop. Returns false when
    /// none is running. Idempotent: a second stop of the same loop is a
    /// no-op returning false.
    pub async fn stop(&self, tenant: &TenantId) -> bool {
        let loops = self.inner.loops.lock().await;
        let Some(entry) = loops.get(tenant) else {
            return false;
        };
        if !entry.is_live() || !entry.enabled.load(Ordering::SeqCst) {
            return false;
        }

        entry.enabled.store(false, Ordering::SeqCst);
        entry.cancel.cancel();
        info!(tenant = %tenant, "watch loop stop requested");
        true
    }

    /// Cancel every live loop (process shutdown path).
    pub async fn shutdown(&self) {
        let mut loops = self.inner.loops.lock().await;
        for (tenant, entry) in loops.drain() {
            entry.enabled.store(false, Ordering::SeqCst);
            entry.cancel.cancel();
            debug!(tenant = %tenant, "watch loop stopping");
        }
    }

    /// Adds a URL to the tenant's watch list and seeds its baseline right
    /// away so the first pass has something to compare against. A failed
    /// seed fetch is not fatal: the URL stays listed and the first
    /// successful pass fetch seeds the baseline instead.
    pub async fn add_url(&self, tenant: &TenantId, url: &str) -> Result<AddedWatch> {
        {
            let mut reg = self.inner.registry.lock().await;
            reg.add_url(tenant, url)?;
            self.inner.store.save(&reg).await?;
        }

        let baseline_established = match self.inner.fetcher.fetch(url).await {
            Ok(content) => {
                let mut reg = self.inner.registry.lock().await;
                if reg.is_watched(tenant, url) {
                    reg.record_snapshot(url, content);
                    self.inner.store.save(&reg).await?;
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "baseline fetch failed; will seed on first pass");
                false
            }
        };

        self.reevaluate(tenant).await;
        Ok(AddedWatch {
            baseline_established,
        })
    }

    /// Removes a URL (discarding its snapshot). Returns true when the
    /// removal emptied the watch list and the running loop was stopped.
    pub async fn remove_url(&self, tenant: &TenantId, url: &str) -> Result<bool> {
        let emptied = {
            let mut reg = self.inner.registry.lock().await;
            reg.remove_url(tenant, url)?;
            self.inner.store.save(&reg).await?;
            reg.urls(tenant).is_empty()
        };

        if emptied {
            let stopped = self.stop(tenant).await;
            if stopped {
                info!(tenant = %tenant, "watch list emptied; loop stopped");
            }
            return Ok(stopped);
        }
        Ok(false)
    }

    /// The tenant's watched URLs, in the order they were added.
    pub async fn list_urls(&self, tenant: &TenantId) -> Vec<String> {
        self.inner.registry.lock().await.urls(tenant)
    }

    pub async fn set_channel(&self, tenant: &TenantId, channel: ChannelId) -> Result<()> {
        {
            let mut reg = self.inner.registry.lock().await;
            reg.set_channel(tenant, channel);
            self.inner.store.save(&reg).await?;
        }
        self.reevaluate(tenant).await;
        Ok(())
    }

    pub async fn set_interval(&self, tenant: &TenantId, minutes: i64) -> Result<()> {
        {
            let mut reg = self.inner.registry.lock().await;
            reg.set_interval(tenant, minutes)?;
            self.inner.store.save(&reg).await?;
        }
        self.reevaluate(tenant).await;
        Ok(())
    }

    /// Every mutation re-evaluates whether the tenant's loop should be
    /// running; a loop that is already live is left alone.
    async fn reevaluate(&self, tenant: &TenantId) {
        let ready = { self.inner.registry.lock().await.ready_to_watch(tenant) };
        if ready && self.start(tenant).await {
            info!(tenant = %tenant, "watch loop started after reconfiguration");
        }
    }

    async fn watch_loop(
        self,
        tenant: TenantId,
        enabled: Arc<AtomicBool>,
        cancel: CancellationToken,
    ) {
        let interval = {
            let reg = self.inner.registry.lock().await;
            if reg.urls(&tenant).is_empty() {
                warn!(tenant = %tenant, "refusing to watch: the watch list is empty");
                return;
            }
            if reg.channel(&tenant).is_none() {
                warn!(tenant = %tenant, "refusing to watch: no notification channel set");
                return;
            }
            let interval = reg.interval_minutes(&tenant);
            if interval == 0 {
                warn!(tenant = %tenant, "refusing to watch: interval must be positive");
                return;
            }
            interval
        };

        info!(tenant = %tenant, interval, "watch loop running");

        // Immediate pass for fast feedback after (re)configuration.
        self.poll_pass(&tenant).await;

        while enabled.load(Ordering::SeqCst) {
            // Re-read the interval every cycle so `set_interval` applies on
            // the next wake without restarting the loop.
            let interval = {
                self.inner
                    .registry
                    .lock()
                    .await
                    .interval_minutes(&tenant)
                    .max(1)
            };
            let now = Local::now();
            let next = next_aligned_wake(now, interval);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(
                tenant = %tenant,
                next = %next.format("%H:%M:%S"),
                wait_secs = wait.as_secs(),
                "sleeping until next aligned wake"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(wait) => {
                    // A stop or disable may have raced the sleep.
                    if !enabled.load(Ordering::SeqCst) {
                        break;
                    }
                    self.poll_pass(&tenant).await;
                }
            }
        }

        info!(tenant = %tenant, "watch loop stopped");
    }

    /// One full check of every watched resource, in declaration order. A
    /// failing resource is skipped and never aborts the rest of the pass.
    async fn poll_pass(&self, tenant: &TenantId) {
        let (urls, channel) = {
            let reg = self.inner.registry.lock().await;
            (reg.urls(tenant), reg.channel(tenant))
        };
        let Some(channel) = channel else {
            return;
        };

        for url in urls {
            if let Err(e) = self.check_url(tenant, channel, &url).await {
                warn!(tenant = %tenant, url = %url, error = %e, "check failed; retrying next cycle");
            }
        }
    }

    async fn check_url(&self, tenant: &TenantId, channel: ChannelId, url: &str) -> Result<()> {
        let current = self.inner.fetcher.fetch(url).await?;

        let previous = {
            let mut reg = self.inner.registry.lock().await;
            // The URL may have been removed while the fetch was in flight.
            if !reg.is_watched(tenant, url) {
                return Ok(());
            }
            let previous = reg.snapshot(url).map(str::to_string);
            match previous {
                Some(previous) => previous,
                None => {
                    // First successful fetch only seeds the baseline.
                    reg.record_snapshot(url, current);
                    self.inner.store.save(&reg).await?;
                    return Ok(());
                }
            }
        };

        // A classifier failure is treated as "no change": never alert on a
        // verdict that was not actually obtained.
        let verdict = match self
            .inner
            .classifier
            .classify(url, &previous, &current)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(url = %url, error = %e, "classification failed; treating as unchanged");
                Verdict::Unchanged
            }
        };

        if verdict == Verdict::Unchanged {
            return Ok(());
        }

        {
            let mut reg = self.inner.registry.lock().await;
            if !reg.is_watched(tenant, url) {
                return Ok(());
            }
            reg.record_snapshot(url, current);
            self.inner.store.save(&reg).await?;
        }

        info!(tenant = %tenant, url = %url, "change detected");
        let text = change_alert(url, Local::now());
        if let Err(e) = self.inner.sink.send(channel, &text).await {
            warn!(url = %url, error = %e, "notification failed");
        }

        Ok(())
    }
}

/// Smallest wall-clock instant after `now` whose minute is the next
/// multiple of `interval_minutes` with seconds at zero; rolls into the next
/// hour (or day) when the multiple reaches 60.
pub fn next_aligned_wake(now: DateTime<Local>, interval_minutes: u32) -> DateTime<Local> {
    let interval = i64::from(interval_minutes.max(1));
    let minute = i64::from(now.minute());
    let next_minute = (minute / interval + 1) * interval;

    let floor = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    floor + chrono::Duration::minutes(next_minute - minute)
}

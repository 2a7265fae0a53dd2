//! The periodic balance sweep.
//!
//! One pass walks a snapshot of the tracked set, fetches fresh balances,
//! seeds baselines for restored accounts, and hands detected changes to
//! the injected [`ChangeSink`]. The next pass is scheduled only after the
//! current one completes, so passes never overlap and a slow upstream
//! stretches the period instead of stacking requests.

use crate::detector::detect_change;
use crate::monitor::{AccountCheck, MonitorLog, PassReport};
use crate::registry::Registry;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracker_core::{AccountId, ChangeEvent};
use tracker_feeds::BalanceSource;
use tracing::{debug, info, warn};

/// Receiver for detected balance changes. The dispatcher implements this;
/// the engine never depends on delivery concerns.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn on_change(&self, account: &AccountId, event: &ChangeEvent);
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause between the end of one pass and the start of the next.
    pub interval: Duration,
    /// Persist a monitor log on every Nth pass even without changes.
    pub log_every: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            log_every: 6,
        }
    }
}

pub struct Poller {
    registry: Arc<Registry>,
    source: Arc<dyn BalanceSource>,
    sink: Arc<dyn ChangeSink>,
    monitor: MonitorLog,
    config: PollerConfig,
    pass_index: AtomicU64,
    wake: Notify,
}

impl Poller {
    pub fn new(
        registry: Arc<Registry>,
        source: Arc<dyn BalanceSource>,
        sink: Arc<dyn ChangeSink>,
        monitor: MonitorLog,
        config: PollerConfig,
    ) -> Self {
        Self {
            registry,
            source,
            sink,
            monitor,
            config,
            pass_index: AtomicU64::new(0),
            wake: Notify::new(),
        }
    }

    /// Drive the sweep forever. Meant to be spawned as its own task.
    pub async fn run(&self) {
        info!(interval_secs = self.config.interval.as_secs(), "Polling loop started");
        loop {
            self.pass().await;
            tokio::select! {
                _ = sleep(self.config.interval) => {}
                _ = self.wake.notified() => {}
            }
        }
    }

    /// Cut the current wait short so a fresh subscription gets verified
    /// promptly instead of waiting out the full interval. A nudge during a
    /// running pass is remembered and wakes the next wait.
    pub fn nudge(&self) {
        self.wake.notify_one();
    }

    /// Execute a single polling pass over the current tracked set.
    pub async fn pass(&self) -> PassReport {
        let entries = self.registry.poll_view().await;
        debug!(accounts = entries.len(), "Checking tracked accounts");

        let mut report = PassReport::new();
        for entry in entries {
            let mut check = AccountCheck {
                address_id: entry.account.clone(),
                previous_balance: entry.balance.clone(),
                new_balance: None,
                subscriber_count: entry.subscriber_count,
                change_detected: false,
            };

            // Unwatched accounts (restored, or created by simulation) are
            // recorded but not polled.
            if entry.subscriber_count == 0 {
                debug!(account = %entry.account, "No subscribers, skipping check");
                report.record(check);
                continue;
            }

            let snapshot = self.source.fetch(&entry.account).await;
            check.new_balance = Some(snapshot.balance.clone());

            if entry.awaiting_baseline {
                // First observation after a restart: adopt silently.
                self.registry
                    .seed_baseline(&entry.account, &snapshot.balance)
                    .await;
                report.record(check);
                continue;
            }

            match detect_change(&entry.balance, &snapshot.balance) {
                Some(event) => {
                    info!(
                        account = %entry.account,
                        old = %event.old_balance,
                        new = %event.new_balance,
                        kind = %event.direction,
                        "Balance change detected"
                    );
                    check.change_detected = true;
                    self.registry
                        .commit_balance(&entry.account, &snapshot.balance)
                        .await;
                    self.sink.on_change(&entry.account, &event).await;
                }
                None => {
                    self.registry.touch(&entry.account).await;
                }
            }
            report.record(check);
        }

        let pass_number = self.pass_index.fetch_add(1, Ordering::SeqCst) + 1;
        if report.has_changes() || pass_number % self.config.log_every == 0 {
            if let Err(e) = self.monitor.persist(&report).await {
                warn!(error = %e, "Failed to write monitor log");
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tracker_core::{BalanceSnapshot, Direction, SubscriberId, Subscription};

    struct ScriptedSource {
        balances: Mutex<HashMap<AccountId, String>>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                balances: Mutex::new(HashMap::new()),
            }
        }

        fn set(&self, account: &str, balance: &str) {
            self.balances
                .lock()
                .unwrap()
                .insert(AccountId::new(account), balance.to_string());
        }
    }

    #[async_trait]
    impl BalanceSource for ScriptedSource {
        async fn fetch(&self, id: &AccountId) -> BalanceSnapshot {
            match self.balances.lock().unwrap().get(id) {
                Some(balance) => BalanceSnapshot {
                    id: id.clone(),
                    balance: balance.clone(),
                    valid_for_tick: 1,
                },
                None => BalanceSnapshot::fallback(id.clone()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(AccountId, ChangeEvent)>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<(AccountId, ChangeEvent)> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChangeSink for RecordingSink {
        async fn on_change(&self, account: &AccountId, event: &ChangeEvent) {
            self.events
                .lock()
                .unwrap()
                .push((account.clone(), event.clone()));
        }
    }

    fn temp_monitor_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "tracker-poller-{tag}-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    fn poller_with(
        source: Arc<ScriptedSource>,
        tag: &str,
    ) -> (Arc<Registry>, Arc<RecordingSink>, Poller) {
        let registry = Arc::new(Registry::new(source.clone(), Arc::new(MemoryStore::new())));
        let sink = Arc::new(RecordingSink::default());
        let poller = Poller::new(
            registry.clone(),
            source,
            sink.clone(),
            MonitorLog::new(temp_monitor_dir(tag)),
            PollerConfig::default(),
        );
        (registry, sink, poller)
    }

    async fn subscribe(registry: &Registry, account: &str, subscriber: &str) {
        registry
            .subscribe(
                &Subscription::new(account, None).unwrap(),
                &SubscriberId::new(subscriber),
            )
            .await;
    }

    #[tokio::test]
    async fn detected_change_reaches_the_sink_and_updates_state() {
        let source = Arc::new(ScriptedSource::new());
        source.set("ACC", "100");
        let (registry, sink, poller) = poller_with(source.clone(), "change");
        subscribe(&registry, "ACC", "socket-1").await;

        source.set("ACC", "150");
        let report = poller.pass().await;

        assert!(report.has_changes());
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, AccountId::new("ACC"));
        assert_eq!(events[0].1.direction, Direction::Incoming);
        assert_eq!(events[0].1.difference, "50.000000");

        // Next pass sees the committed balance and stays quiet.
        let report = poller.pass().await;
        assert!(!report.has_changes());
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn unwatched_accounts_are_recorded_but_not_fetched() {
        let source = Arc::new(ScriptedSource::new());
        source.set("ACC", "999");
        let (registry, sink, poller) = poller_with(source.clone(), "skip");
        registry
            .restore([AccountId::new("ACC")].into_iter().collect())
            .await;

        let report = poller.pass().await;

        assert_eq!(report.check_count(), 1);
        assert_eq!(report.checks[0].new_balance, None);
        assert!(sink.events().is_empty());
        // The placeholder balance is untouched while nobody watches.
        assert_eq!(registry.poll_view().await[0].balance, "0");
    }

    #[tokio::test]
    async fn restored_account_seeds_its_baseline_without_an_event() {
        let source = Arc::new(ScriptedSource::new());
        let (registry, sink, poller) = poller_with(source.clone(), "seed");
        registry
            .restore([AccountId::new("ACC")].into_iter().collect())
            .await;

        // A subscriber arrives while the account still awaits its baseline.
        source.set("ACC", "500");
        subscribe(&registry, "ACC", "socket-1").await;

        let report = poller.pass().await;
        assert!(!report.has_changes());
        assert!(sink.events().is_empty());
        assert_eq!(registry.poll_view().await[0].balance, "500");

        // A real change after seeding is reported normally.
        source.set("ACC", "700");
        poller.pass().await;
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.difference, "200.000000");
    }

    #[tokio::test]
    async fn nudge_cuts_the_wait_short() {
        let source = Arc::new(ScriptedSource::new());
        source.set("ACC", "100");
        let registry = Arc::new(Registry::new(source.clone(), Arc::new(MemoryStore::new())));
        let sink = Arc::new(RecordingSink::default());
        let poller = Arc::new(Poller::new(
            registry.clone(),
            source.clone(),
            sink.clone(),
            MonitorLog::new(temp_monitor_dir("nudge")),
            PollerConfig {
                // Long enough that only a nudge can trigger a second pass.
                interval: Duration::from_secs(300),
                ..PollerConfig::default()
            },
        ));

        subscribe(&registry, "ACC", "socket-1").await;
        let loop_handle = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.run().await })
        };

        // Let the first pass complete, then change the balance upstream.
        sleep(Duration::from_millis(50)).await;
        assert!(sink.events().is_empty());
        source.set("ACC", "150");

        poller.nudge();
        sleep(Duration::from_millis(50)).await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.difference, "50.000000");
        loop_handle.abort();
    }

    #[tokio::test]
    async fn sub_epsilon_drift_produces_no_event() {
        let source = Arc::new(ScriptedSource::new());
        source.set("ACC", "100.000000");
        let (registry, sink, poller) = poller_with(source.clone(), "drift");
        subscribe(&registry, "ACC", "socket-1").await;

        source.set("ACC", "100.0000001");
        let report = poller.pass().await;

        assert!(!report.has_changes());
        assert!(sink.events().is_empty());
    }
}

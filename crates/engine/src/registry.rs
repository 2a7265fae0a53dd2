//! Subscription registry: the authoritative in-memory tracking state.
//!
//! Two maps are kept strictly in sync under one lock: the forward relation
//! (account -> subscribers + their preferences) and the reverse index
//! (subscriber -> accounts). Every mutation applies its in-memory change
//! while holding the write guard and without awaiting; fetches and saves
//! happen outside the guard.

use crate::store::TrackedStore;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracker_core::{AccountId, BalanceSnapshot, DeliveryPreferences, SubscriberId, Subscription};
use tracker_feeds::BalanceSource;
use tracing::{debug, error, info};

/// Placeholder balance for accounts restored from the persisted id set.
const PLACEHOLDER_BALANCE: &str = "0";

/// Per-account tracking state.
#[derive(Debug, Clone)]
pub struct TrackedAccount {
    /// Last-known balance as a decimal string. Authoritative only after
    /// the first successful poll when `pending_init` is set.
    pub balance: String,
    /// True until the first real poll overwrites the placeholder balance.
    /// Distinguishes "never observed" from "observed zero".
    pub pending_init: bool,
    /// Timestamp of the most recent poll attempt, success or failure.
    pub last_checked_at: DateTime<Utc>,
    pub subscribers: HashSet<SubscriberId>,
    pub preferences: HashMap<SubscriberId, DeliveryPreferences>,
}

impl TrackedAccount {
    fn with_balance(balance: String) -> Self {
        Self {
            balance,
            pending_init: false,
            last_checked_at: Utc::now(),
            subscribers: HashSet::new(),
            preferences: HashMap::new(),
        }
    }

    fn placeholder() -> Self {
        Self {
            balance: PLACEHOLDER_BALANCE.to_string(),
            pending_init: true,
            ..Self::with_balance(String::new())
        }
    }

    /// True when the account still awaits its baseline observation.
    pub fn awaiting_baseline(&self) -> bool {
        self.pending_init && self.balance == PLACEHOLDER_BALANCE
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    accounts: HashMap<AccountId, TrackedAccount>,
    watchers: HashMap<SubscriberId, HashSet<AccountId>>,
}

impl RegistryState {
    /// Drop one (account, subscriber) edge from both indices, evicting the
    /// account if this removal emptied its subscriber set. Returns whether
    /// the membership existed.
    fn remove_membership(&mut self, account: &AccountId, subscriber: &SubscriberId) -> bool {
        let mut removed = false;
        if let Some(tracked) = self.accounts.get_mut(account) {
            removed = tracked.subscribers.remove(subscriber);
            tracked.preferences.remove(subscriber);
            // Unwatched accounts are not polled and not kept: the account
            // leaves the tracked set the moment its last watcher does.
            if removed && tracked.subscribers.is_empty() {
                self.accounts.remove(account);
                debug!(account = %account, "Last subscriber left, account untracked");
            }
        }
        if let Some(watched) = self.watchers.get_mut(subscriber) {
            watched.remove(account);
            if watched.is_empty() {
                self.watchers.remove(subscriber);
            }
        }
        removed
    }
}

/// One account's view for a polling pass.
#[derive(Debug, Clone)]
pub struct PollEntry {
    pub account: AccountId,
    pub balance: String,
    pub awaiting_baseline: bool,
    pub subscriber_count: usize,
}

/// The subscription registry. All external access goes through these
/// operations; the maps themselves never leave the component.
pub struct Registry {
    state: RwLock<RegistryState>,
    source: Arc<dyn BalanceSource>,
    store: Arc<dyn TrackedStore>,
}

impl Registry {
    pub fn new(source: Arc<dyn BalanceSource>, store: Arc<dyn TrackedStore>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            source,
            store,
        }
    }

    /// Subscribe a subscriber to an account, creating the tracked entry if
    /// this is the first watcher. Idempotent on membership; preferences
    /// given here overwrite any prior value for this subscriber.
    pub async fn subscribe(
        &self,
        request: &Subscription,
        subscriber: &SubscriberId,
    ) -> BalanceSnapshot {
        let account = request.account().clone();
        // The fetch happens before the mutation so a brand-new account
        // starts from a real baseline, and the caller always gets a
        // current snapshot back.
        let snapshot = self.source.fetch(&account).await;

        {
            let mut state = self.state.write().await;
            let tracked = state
                .accounts
                .entry(account.clone())
                .or_insert_with(|| TrackedAccount::with_balance(snapshot.balance.clone()));
            tracked.subscribers.insert(subscriber.clone());
            if let Some(prefs) = request.preferences() {
                tracked.preferences.insert(subscriber.clone(), prefs.clone());
            }
            state
                .watchers
                .entry(subscriber.clone())
                .or_default()
                .insert(account.clone());
        }

        info!(account = %account, subscriber = %subscriber, "Subscribed");
        self.persist().await;
        snapshot
    }

    /// Remove one subscription edge. Unsubscribing a non-member is a safe
    /// no-op. Evicts the account when its subscriber set empties.
    pub async fn unsubscribe(&self, account: &AccountId, subscriber: &SubscriberId) {
        let removed = {
            let mut state = self.state.write().await;
            state.remove_membership(account, subscriber)
        };
        if removed {
            info!(account = %account, subscriber = %subscriber, "Unsubscribed");
            self.persist().await;
        }
    }

    /// Self-healing prune used by the dispatcher when a subscriber's live
    /// connection turns out to be dead: membership and the preference
    /// entry go together, on both index sides.
    pub async fn prune_subscriber(&self, account: &AccountId, subscriber: &SubscriberId) {
        self.unsubscribe(account, subscriber).await;
    }

    /// Bulk-unsubscribe across every account the subscriber watches, used
    /// on disconnect. Iterates a stable snapshot of the reverse index
    /// entry. Returns the number of accounts the subscriber was removed
    /// from.
    pub async fn remove_subscriber(&self, subscriber: &SubscriberId) -> usize {
        let removed = {
            let mut state = self.state.write().await;
            match state.watchers.remove(subscriber) {
                Some(watched) => {
                    for account in &watched {
                        if let Some(tracked) = state.accounts.get_mut(account) {
                            tracked.subscribers.remove(subscriber);
                            tracked.preferences.remove(subscriber);
                            if tracked.subscribers.is_empty() {
                                state.accounts.remove(account);
                            }
                        }
                    }
                    watched.len()
                }
                None => 0,
            }
        };
        if removed > 0 {
            info!(subscriber = %subscriber, accounts = removed, "Subscriber removed");
            self.persist().await;
        }
        removed
    }

    /// Ordered snapshot of the currently tracked account ids.
    pub async fn list_tracked(&self) -> Vec<AccountId> {
        let state = self.state.read().await;
        let mut ids: Vec<AccountId> = state.accounts.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Point-in-time snapshot of an account's subscriber set.
    pub async fn subscribers_of(&self, account: &AccountId) -> Vec<SubscriberId> {
        let state = self.state.read().await;
        state
            .accounts
            .get(account)
            .map(|t| t.subscribers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Current delivery preferences of one subscriber on one account.
    pub async fn preferences_of(
        &self,
        account: &AccountId,
        subscriber: &SubscriberId,
    ) -> Option<DeliveryPreferences> {
        let state = self.state.read().await;
        state
            .accounts
            .get(account)
            .and_then(|t| t.preferences.get(subscriber).cloned())
    }

    /// Accounts a subscriber currently watches.
    pub async fn watched_by(&self, subscriber: &SubscriberId) -> Vec<AccountId> {
        let state = self.state.read().await;
        let mut ids: Vec<AccountId> = state
            .watchers
            .get(subscriber)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Seed accounts from the persisted id set at startup. Restored
    /// entries carry the placeholder balance and await their baseline;
    /// they gain subscribers only through new subscriptions.
    pub async fn restore(&self, ids: HashSet<AccountId>) -> usize {
        let mut state = self.state.write().await;
        let mut restored = 0;
        for id in ids {
            state.accounts.entry(id).or_insert_with(|| {
                restored += 1;
                TrackedAccount::placeholder()
            });
        }
        restored
    }

    /// Ensure an account is tracked (with no subscribers) and return its
    /// current balance. Used by the transaction simulation endpoint.
    pub async fn ensure_tracked(&self, account: &AccountId) -> String {
        {
            let state = self.state.read().await;
            if let Some(tracked) = state.accounts.get(account) {
                return tracked.balance.clone();
            }
        }
        let snapshot = self.source.fetch(account).await;
        let balance = {
            let mut state = self.state.write().await;
            state
                .accounts
                .entry(account.clone())
                .or_insert_with(|| TrackedAccount::with_balance(snapshot.balance.clone()))
                .balance
                .clone()
        };
        self.persist().await;
        balance
    }

    /// Snapshot the tracked set for one polling pass.
    pub async fn poll_view(&self) -> Vec<PollEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<PollEntry> = state
            .accounts
            .iter()
            .map(|(account, tracked)| PollEntry {
                account: account.clone(),
                balance: tracked.balance.clone(),
                awaiting_baseline: tracked.awaiting_baseline(),
                subscriber_count: tracked.subscribers.len(),
            })
            .collect();
        entries.sort_by(|a, b| a.account.cmp(&b.account));
        entries
    }

    /// Adopt the first real observation of a restored account as its
    /// baseline, clearing the pending flag. No event is emitted for this
    /// transition. A stale call for an untracked account is discarded.
    pub async fn seed_baseline(&self, account: &AccountId, balance: &str) {
        let mut state = self.state.write().await;
        if let Some(tracked) = state.accounts.get_mut(account) {
            info!(account = %account, balance = %balance, "Seeded baseline balance");
            tracked.balance = balance.to_string();
            tracked.pending_init = false;
            tracked.last_checked_at = Utc::now();
        }
    }

    /// Store a new balance after a detected change. Stale calls for
    /// accounts untracked in the meantime are discarded.
    pub async fn commit_balance(&self, account: &AccountId, new_balance: &str) {
        let mut state = self.state.write().await;
        if let Some(tracked) = state.accounts.get_mut(account) {
            tracked.balance = new_balance.to_string();
            tracked.last_checked_at = Utc::now();
        }
    }

    /// Record a poll attempt that produced no change.
    pub async fn touch(&self, account: &AccountId) {
        let mut state = self.state.write().await;
        if let Some(tracked) = state.accounts.get_mut(account) {
            tracked.last_checked_at = Utc::now();
        }
    }

    /// Persist the current tracked id set. Failures are logged and the
    /// in-memory state stays authoritative; the next successful save
    /// reconciles.
    async fn persist(&self) {
        let ids: HashSet<AccountId> = {
            let state = self.state.read().await;
            state.accounts.keys().cloned().collect()
        };
        if let Err(e) = self.store.save(&ids).await {
            error!(error = %e, "Failed to persist tracked id set");
        }
    }
}

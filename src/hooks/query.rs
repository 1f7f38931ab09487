//! Generic query handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use super::{PollOptions, QueryState};
use crate::app_state::AppState;
use crate::config::PollIntervals;
use crate::domain::{CacheEntry, CacheKey, ChangeKind, StoreEvent, WalletSession};
use crate::error::SyncError;
use crate::store::{AuctionStore, FetchMode};
use crate::sync::{PollCallback, PollSubscription, PollingManager};

/// One readable resource: how to key it and how to read it back.
pub trait QuerySource: fmt::Debug + Send + Sync {
    /// What the handle exposes as `data`.
    type Data: Clone + Send + Sync + 'static;

    /// Cache key for the current parameters and wallet.
    ///
    /// # Errors
    ///
    /// Returns the skip condition: a missing parameter
    /// ([`SyncError::InvalidInput`]), or for user-scoped resources
    /// [`SyncError::WalletNotConnected`] / [`SyncError::WalletSyncing`].
    fn key(&self, wallet: &WalletSession) -> Result<CacheKey, SyncError>;

    /// Reads the cached entry for `key`.
    fn read(&self, store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Self::Data>>;

    /// Default polling period of the resource.
    fn poll_interval(&self, intervals: &PollIntervals) -> Duration;
}

/// Handle over one cached resource.
///
/// Unmounted until [`Query::mount`]; dropping it unmounts. In-flight
/// fetches are never aborted.
///
/// While mounted, [`Query::changed`] keeps the handle current: an
/// invalidated entry is refetched in the background and a wallet change
/// that alters the key remounts the handle.
#[derive(Debug)]
pub struct Query<S: QuerySource> {
    source: S,
    store: AuctionStore,
    polling: PollingManager,
    wallet: watch::Receiver<WalletSession>,
    intervals: PollIntervals,
    poll: PollOptions,
    events: broadcast::Receiver<StoreEvent>,
    mounted: Option<CacheKey>,
    skipped: Option<SyncError>,
    subscription: Option<PollSubscription>,
}

impl<S: QuerySource> Query<S> {
    /// Creates an unmounted handle.
    #[must_use]
    pub fn new(app: &AppState, source: S, poll: PollOptions) -> Self {
        Self {
            source,
            store: app.store.clone(),
            polling: app.polling.clone(),
            wallet: app.watch_wallet(),
            intervals: *app.poll_intervals(),
            poll,
            events: app.store.events().subscribe(),
            mounted: None,
            skipped: None,
            subscription: None,
        }
    }

    /// Current parameters.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Key of the mounted resource; `None` while unmounted or skipped.
    #[must_use]
    pub const fn key(&self) -> Option<&CacheKey> {
        self.mounted.as_ref()
    }

    /// Returns `true` while a poll subscription is held.
    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.subscription.is_some()
    }

    /// Mounts the handle: subscribes to polling when enabled and fetches
    /// when nothing is cached, the entry has no data, or it is stale.
    ///
    /// Does nothing while a skip condition holds; the reason is reported
    /// as the state's error. A failed fetch is recorded on the cache entry
    /// and shows up in [`Query::state`].
    pub async fn mount(&mut self) {
        self.unmount();

        let resolved = self.source.key(&self.wallet.borrow_and_update());
        let key = match resolved {
            Ok(key) => key,
            Err(reason) => {
                tracing::debug!(source = ?self.source, %reason, "query skipped");
                self.skipped = Some(reason);
                self.events = self.events.resubscribe();
                return;
            }
        };
        self.mounted = Some(key.clone());

        if self.poll.enabled {
            let interval = self
                .poll
                .interval
                .unwrap_or_else(|| self.source.poll_interval(&self.intervals));
            let callback = poll_callback(self.store.clone(), key.clone());
            self.subscription = Some(self.polling.subscribe(key.to_string(), callback, interval));
        }

        if self.needs_fetch(&key)
            && let Err(e) = self.store.refresh(&key, FetchMode::IfStale).await
        {
            tracing::debug!(%key, error = %e, "initial fetch failed");
        }
        // Writes up to here are already visible to `state`.
        self.events = self.events.resubscribe();
    }

    /// Re-keys the handle and mounts it again.
    pub async fn set_source(&mut self, source: S) {
        self.source = source;
        self.mount().await;
    }

    /// Drops the poll subscription and forgets the key.
    pub fn unmount(&mut self) {
        self.subscription = None;
        self.mounted = None;
        self.skipped = None;
    }

    /// View state derived from the cache.
    #[must_use]
    pub fn state(&self) -> QueryState<S::Data> {
        let Some(key) = &self.mounted else {
            return QueryState {
                error: self.skipped.clone(),
                ..QueryState::default()
            };
        };
        let entry = self.source.read(&self.store, key).unwrap_or_default();
        QueryState::from_entry(entry, self.store.is_stale(key))
    }

    /// Forces a fetch, cache freshness notwithstanding.
    ///
    /// # Errors
    ///
    /// Returns the skip condition, or the fetch error (which is also
    /// recorded on the cache entry).
    pub async fn refetch(&self) -> Result<(), SyncError> {
        let key = self.source.key(&self.wallet.borrow())?;
        self.store.refresh(&key, FetchMode::Always).await
    }

    /// Waits until the store announces a write this handle should
    /// re-read, or until a wallet change re-keys it. Returns early when the
    /// handle fell behind the event bus.
    ///
    /// An invalidation of the mounted entry starts a background refetch;
    /// the stale data stays readable until it lands.
    pub async fn changed(&mut self) {
        loop {
            tokio::select! {
                received = self.events.recv() => match received {
                    Ok(event) => {
                        let relevant = match &self.mounted {
                            Some(key) => event.concerns(key),
                            None => event.key.is_none(),
                        };
                        if relevant {
                            if event.kind == ChangeKind::Invalidated {
                                self.revalidate();
                            }
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "query handle lagged behind store events");
                        self.revalidate();
                        return;
                    }
                    Err(RecvError::Closed) => return,
                },
                Ok(()) = self.wallet.changed() => {
                    if self.mounted.is_none() && self.skipped.is_none() {
                        continue;
                    }
                    let rekeyed = {
                        let wallet = self.wallet.borrow_and_update();
                        self.source.key(&wallet)
                    };
                    match rekeyed {
                        Ok(key) if self.mounted.as_ref() == Some(&key) => {}
                        Err(reason) if self.mounted.is_none() => {
                            if self.skipped.as_ref() != Some(&reason) {
                                self.skipped = Some(reason);
                                return;
                            }
                        }
                        _ => {
                            tracing::debug!(source = ?self.source, "wallet changed, remounting");
                            self.mount().await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Refetches the mounted entry in the background if it needs it.
    fn revalidate(&self) {
        let Some(key) = self.mounted.clone() else {
            return;
        };
        if !self.needs_fetch(&key) {
            return;
        }
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.refresh(&key, FetchMode::IfStale).await {
                tracing::debug!(%key, error = %e, "revalidation failed");
            }
        });
    }

    fn needs_fetch(&self, key: &CacheKey) -> bool {
        self.source
            .read(&self.store, key)
            .is_none_or(|entry| entry.data.is_none())
            || self.store.is_stale(key)
    }
}

fn poll_callback(store: AuctionStore, key: CacheKey) -> PollCallback {
    Arc::new(move || {
        let store = store.clone();
        let key = key.clone();
        async move { store.refresh(&key, FetchMode::Always).await }.boxed()
    })
}

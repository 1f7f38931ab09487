//! Normalized auction store.
//!
//! The single source of truth of the synchronization layer. Every auction
//! is stored once, keyed by ID; list views (active, settled, by creator)
//! only hold ID references into that map. Bid history, per-user
//! commitments and the indexer bootstrap state have their own entries.
//!
//! Every fetch goes through a [`QueryDeduplicator`](crate::sync::QueryDeduplicator)
//! keyed by resource and parameters and is stamped with a monotonic
//! sequence number: a response older than the last one applied to an
//! entry is discarded. Every write publishes a [`StoreEvent`] on the
//! [`EventBus`].

mod fetch;
mod indexer;
mod invalidate;
mod state;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::{AppTarget, ApplicationClient, GraphQlRequest, decode_field, operations};
use crate::config::{CacheTtls, SyncConfig};
use crate::domain::{
    Auction, AuctionCommitment, AuctionId, BidRecord, CacheEntry, CacheKey, ChainId, ChangeKind,
    Clock, EventBus, IndexerState, ListCacheEntry, StoreEvent, SystemClock, UserCommitment,
};
use crate::error::SyncError;
use crate::persistence::BootstrapRecordStore;

use state::{Cached, Dedups, StoreState};

/// Whether a fetch may be answered from a fresh cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Return the cached value when it exists and is within its TTL.
    #[default]
    IfStale,
    /// Always go to the network (refetch, polling).
    Always,
}

#[derive(Debug)]
struct StoreInner {
    client: Arc<dyn ApplicationClient>,
    records: Arc<dyn BootstrapRecordStore>,
    clock: Arc<dyn Clock>,
    ttls: CacheTtls,
    all_auctions_limit: usize,
    aac_chain: ChainId,
    auction_app_id: String,
    events: EventBus,
    state: Mutex<StoreState>,
    seq: AtomicU64,
    dedups: Dedups,
}

/// Normalized cache of auctions, bids, commitments and indexer state.
///
/// Cheap to clone: clones share the same cache.
#[derive(Debug, Clone)]
pub struct AuctionStore {
    inner: Arc<StoreInner>,
}

impl AuctionStore {
    /// Creates a store using the system clock.
    #[must_use]
    pub fn new(
        client: Arc<dyn ApplicationClient>,
        records: Arc<dyn BootstrapRecordStore>,
        config: &SyncConfig,
    ) -> Self {
        Self::with_clock(client, records, config, Arc::new(SystemClock))
    }

    /// Creates a store reading time from `clock`.
    #[must_use]
    pub fn with_clock(
        client: Arc<dyn ApplicationClient>,
        records: Arc<dyn BootstrapRecordStore>,
        config: &SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                client,
                records,
                clock,
                ttls: config.ttls,
                all_auctions_limit: config.all_auctions_limit,
                aac_chain: config.aac_chain.clone(),
                auction_app_id: config.auction_app_id.clone(),
                events: EventBus::new(config.event_bus_capacity),
                state: Mutex::new(StoreState::default()),
                seq: AtomicU64::new(0),
                dedups: Dedups::default(),
            }),
        }
    }

    /// Bus on which every cache change is announced.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Current time according to the store's clock, ms since epoch.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    /// Auction authority chain this store reads from.
    #[must_use]
    pub fn aac_chain(&self) -> &ChainId {
        &self.inner.aac_chain
    }

    /// Time-to-live of the entry `key` addresses, in milliseconds.
    #[must_use]
    pub fn ttl_for(&self, key: &CacheKey) -> i64 {
        let ttls = &self.inner.ttls;
        match key {
            CacheKey::AuctionSummary(_) => ttls.auction_summary_ms,
            CacheKey::AllAuctions
            | CacheKey::ActiveAuctions { .. }
            | CacheKey::SettledAuctions { .. }
            | CacheKey::AuctionsByCreator { .. } => ttls.auction_list_ms,
            CacheKey::BidHistory { .. } => ttls.bid_history_ms,
            CacheKey::UserCommitment { .. } | CacheKey::AllMyCommitments { .. } => {
                ttls.commitment_ms
            }
            // Bootstrap state only goes stale through reset.
            CacheKey::Indexer => i64::MAX,
        }
    }

    /// Staleness predicate: `true` if no entry exists, it is idle, or it is
    /// older than its TTL.
    #[must_use]
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        let now = self.now_ms();
        let ttl = self.ttl_for(key);
        self.state().is_stale(key, now, ttl)
    }

    /// Number of remote fetches currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.dedups.in_flight_count()
    }

    /// Snapshot of an auction entry.
    #[must_use]
    pub fn auction(&self, id: AuctionId) -> Option<CacheEntry<Arc<Auction>>> {
        self.state().auctions.get(&id).cloned()
    }

    /// Snapshot of a list entry (active, settled or by-creator page).
    #[must_use]
    pub fn list(&self, key: &CacheKey) -> Option<ListCacheEntry> {
        self.state().lists.get(key).cloned()
    }

    /// Resolves ID references against the normalized auction map, skipping
    /// IDs with no cached record.
    #[must_use]
    pub fn resolve_auctions(&self, ids: &[AuctionId]) -> Vec<Arc<Auction>> {
        let state = self.state();
        ids.iter()
            .filter_map(|id| state.auctions.get(id).and_then(|e| e.data.clone()))
            .collect()
    }

    /// Snapshot of a bid-history page entry.
    #[must_use]
    pub fn bid_history(
        &self,
        auction_id: AuctionId,
        offset: usize,
        limit: usize,
    ) -> Option<CacheEntry<Arc<Vec<BidRecord>>>> {
        let key = CacheKey::BidHistory {
            auction_id,
            offset,
            limit,
        };
        self.state().bid_history.get(&key).cloned()
    }

    /// Snapshot of a user's commitment entry for one auction.
    #[must_use]
    pub fn commitment(
        &self,
        auction_id: AuctionId,
        user_chain: &ChainId,
    ) -> Option<CacheEntry<Arc<UserCommitment>>> {
        self.state()
            .commitments
            .get(&(auction_id, user_chain.clone()))
            .cloned()
    }

    /// Snapshot of a user's all-commitments entry.
    #[must_use]
    pub fn all_my_commitments(
        &self,
        user_chain: &ChainId,
    ) -> Option<CacheEntry<Arc<Vec<AuctionCommitment>>>> {
        self.state().all_commitments.get(user_chain).cloned()
    }

    /// Snapshot of the indexer bootstrap entry. See
    /// [`AuctionStore::indexer_state`] for the status as presented.
    #[must_use]
    pub fn indexer(&self) -> CacheEntry<IndexerState> {
        self.state().indexer.clone()
    }

    /// Drops every cached entry. In-flight fetches still complete and
    /// write into fresh entries.
    pub fn clear(&self) {
        *self.state() = StoreState::default();
        self.publish_all(ChangeKind::Cleared);
        tracing::info!("auction store cleared");
    }

    /// Runs a mutation and checks its envelope.
    ///
    /// # Errors
    ///
    /// Returns the transport error, [`SyncError::Remote`] for envelope
    /// errors, or [`SyncError::NullPayload`] when the mutation returned no
    /// payload.
    pub async fn mutate(
        &self,
        target: &AppTarget,
        request: &GraphQlRequest,
    ) -> Result<serde_json::Value, SyncError> {
        let raw = self.inner.client.mutate(target, request).await?;
        decode_field(&raw, request.field())
    }

    /// Asks the authority chain to process pending messages.
    ///
    /// # Errors
    ///
    /// Same as [`AuctionStore::mutate`].
    pub async fn trigger(&self) -> Result<(), SyncError> {
        self.mutate(&AppTarget::Authority, &operations::trigger())
            .await
            .map(|_| ())
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_seq(&self) -> u64 {
        self.inner.seq.fetch_add(1, Ordering::Relaxed).saturating_add(1)
    }

    fn publish(&self, key: CacheKey, kind: ChangeKind) {
        let _ = self.inner.events.publish(StoreEvent::new(key, kind));
    }

    fn publish_all(&self, kind: ChangeKind) {
        let _ = self.inner.events.publish(StoreEvent::everything(kind));
    }

    /// Cached data for `key` if present and within its TTL.
    fn fresh<T: Cached>(&self, key: &CacheKey) -> Option<T> {
        let now = self.now_ms();
        let ttl = self.ttl_for(key);
        let state = self.state();
        let entry = T::peek(&state, key)?;
        if entry.is_stale(now, ttl) {
            return None;
        }
        entry.data.clone()
    }

    /// Marks the entry loading and returns the sequence number of the fetch.
    fn begin<T: Cached>(&self, key: &CacheKey) -> u64 {
        let seq = self.next_seq();
        if let Some(entry) = T::slot(&mut self.state(), key) {
            entry.begin_loading();
        }
        self.publish(key.clone(), ChangeKind::Loading);
        seq
    }

    /// Applies the outcome of fetch `seq` to the entry, unless a newer one
    /// already landed.
    fn settle<T: Cached>(
        &self,
        key: &CacheKey,
        seq: u64,
        result: Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        let now = self.now_ms();
        let (outcome, change) = {
            let mut state = self.state();
            let Some(entry) = T::slot(&mut state, key) else {
                return Err(SyncError::Internal(format!("no cache slot for {key}")));
            };
            match result {
                Ok(data) => {
                    if entry.resolve_success(data.clone(), now, seq) {
                        (Ok(data), Some(ChangeKind::Updated))
                    } else {
                        tracing::debug!(%key, seq, "discarding out-of-order response");
                        (Ok(entry.data.clone().unwrap_or(data)), None)
                    }
                }
                Err(e) => {
                    let applied = entry.resolve_error(e.clone(), seq);
                    (Err(e), applied.then_some(ChangeKind::Failed))
                }
            }
        };
        if let Err(e) = &outcome {
            tracing::warn!(%key, error = %e, "fetch failed");
        }
        if let Some(kind) = change {
            self.publish(key.clone(), kind);
        }
        outcome
    }

    /// Shared fetch path: fresh-cache short-circuit, deduplication,
    /// loading state, sequence stamping and settlement.
    async fn fetch_entry<T, F, Fut>(
        &self,
        key: CacheKey,
        mode: FetchMode,
        remote: F,
    ) -> Result<T, SyncError>
    where
        T: Cached,
        F: FnOnce(Self, u64) -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        if mode == FetchMode::IfStale
            && let Some(data) = self.fresh::<T>(&key)
        {
            tracing::debug!(%key, "cache hit");
            return Ok(data);
        }

        let dedup_key = key.to_string();
        let store = self.clone();
        T::dedup(&self.inner.dedups)
            .deduplicate(&dedup_key, move || {
                let seq = store.begin::<T>(&key);
                let request = remote(store.clone(), seq);
                async move {
                    let result = request.await;
                    store.settle(&key, seq, result)
                }
            })
            .await
    }
}

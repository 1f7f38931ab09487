//! Cache maps owned by the store and typed access to their entries.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    Auction, AuctionCommitment, AuctionId, BidRecord, CacheEntry, CacheKey, ChainId,
    IndexerState, ListCacheEntry, UserCommitment,
};
use crate::sync::QueryDeduplicator;

/// Every cache map. Only the store touches this, always under its mutex.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) auctions: HashMap<AuctionId, CacheEntry<Arc<Auction>>>,
    /// Metadata of the shared "fetch all" primitive: every known ID,
    /// newest first.
    pub(crate) all_auctions: CacheEntry<Arc<Vec<AuctionId>>>,
    pub(crate) lists: HashMap<CacheKey, ListCacheEntry>,
    pub(crate) bid_history: HashMap<CacheKey, CacheEntry<Arc<Vec<BidRecord>>>>,
    pub(crate) commitments: HashMap<(AuctionId, ChainId), CacheEntry<Arc<UserCommitment>>>,
    pub(crate) all_commitments: HashMap<ChainId, CacheEntry<Arc<Vec<AuctionCommitment>>>>,
    pub(crate) indexer: CacheEntry<IndexerState>,
}

impl StoreState {
    /// Staleness of whatever entry `key` addresses; a missing entry is stale.
    pub(crate) fn is_stale(&self, key: &CacheKey, now_ms: i64, ttl_ms: i64) -> bool {
        match key {
            CacheKey::AuctionSummary(id) => self
                .auctions
                .get(id)
                .is_none_or(|e| e.is_stale(now_ms, ttl_ms)),
            CacheKey::AllAuctions => self.all_auctions.is_stale(now_ms, ttl_ms),
            CacheKey::ActiveAuctions { .. }
            | CacheKey::SettledAuctions { .. }
            | CacheKey::AuctionsByCreator { .. } => self
                .lists
                .get(key)
                .is_none_or(|l| l.entry.is_stale(now_ms, ttl_ms)),
            CacheKey::BidHistory { .. } => self
                .bid_history
                .get(key)
                .is_none_or(|e| e.is_stale(now_ms, ttl_ms)),
            CacheKey::UserCommitment {
                auction_id,
                user_chain,
            } => self
                .commitments
                .get(&(*auction_id, user_chain.clone()))
                .is_none_or(|e| e.is_stale(now_ms, ttl_ms)),
            CacheKey::AllMyCommitments { user_chain } => self
                .all_commitments
                .get(user_chain)
                .is_none_or(|e| e.is_stale(now_ms, ttl_ms)),
            CacheKey::Indexer => self.indexer.is_stale(now_ms, ttl_ms),
        }
    }
}

/// One deduplicator per cached value type; keys keep resources apart.
#[derive(Debug, Default)]
pub(crate) struct Dedups {
    auctions: QueryDeduplicator<Arc<Auction>>,
    id_lists: QueryDeduplicator<Arc<Vec<AuctionId>>>,
    bids: QueryDeduplicator<Arc<Vec<BidRecord>>>,
    commitments: QueryDeduplicator<Arc<UserCommitment>>,
    all_commitments: QueryDeduplicator<Arc<Vec<AuctionCommitment>>>,
    indexer: QueryDeduplicator<IndexerState>,
}

impl Dedups {
    pub(crate) fn in_flight_count(&self) -> usize {
        self.auctions.in_flight_count()
            + self.id_lists.in_flight_count()
            + self.bids.in_flight_count()
            + self.commitments.in_flight_count()
            + self.all_commitments.in_flight_count()
            + self.indexer.in_flight_count()
    }
}

/// A value type the store caches, and where its entries live.
pub(crate) trait Cached: Clone + Send + Sync + 'static {
    /// Entry for `key`, created idle if missing. `None` if `key` does not
    /// address this type.
    fn slot<'a>(state: &'a mut StoreState, key: &CacheKey) -> Option<&'a mut CacheEntry<Self>>;

    /// Entry for `key`, if it exists.
    fn peek<'a>(state: &'a StoreState, key: &CacheKey) -> Option<&'a CacheEntry<Self>>;

    /// Deduplicator for this type.
    fn dedup(dedups: &Dedups) -> &QueryDeduplicator<Self>;
}

impl Cached for Arc<Auction> {
    fn slot<'a>(state: &'a mut StoreState, key: &CacheKey) -> Option<&'a mut CacheEntry<Self>> {
        match key {
            CacheKey::AuctionSummary(id) => Some(state.auctions.entry(*id).or_default()),
            _ => None,
        }
    }

    fn peek<'a>(state: &'a StoreState, key: &CacheKey) -> Option<&'a CacheEntry<Self>> {
        match key {
            CacheKey::AuctionSummary(id) => state.auctions.get(id),
            _ => None,
        }
    }

    fn dedup(dedups: &Dedups) -> &QueryDeduplicator<Self> {
        &dedups.auctions
    }
}

impl Cached for Arc<Vec<AuctionId>> {
    fn slot<'a>(state: &'a mut StoreState, key: &CacheKey) -> Option<&'a mut CacheEntry<Self>> {
        match key {
            CacheKey::AllAuctions => Some(&mut state.all_auctions),
            CacheKey::ActiveAuctions { offset, limit }
            | CacheKey::SettledAuctions { offset, limit }
            | CacheKey::AuctionsByCreator { offset, limit, .. } => {
                let list = state
                    .lists
                    .entry(key.clone())
                    .or_insert_with(|| ListCacheEntry::new(*offset, *limit));
                Some(&mut list.entry)
            }
            _ => None,
        }
    }

    fn peek<'a>(state: &'a StoreState, key: &CacheKey) -> Option<&'a CacheEntry<Self>> {
        match key {
            CacheKey::AllAuctions => Some(&state.all_auctions),
            _ => state.lists.get(key).map(|list| &list.entry),
        }
    }

    fn dedup(dedups: &Dedups) -> &QueryDeduplicator<Self> {
        &dedups.id_lists
    }
}

impl Cached for Arc<Vec<BidRecord>> {
    fn slot<'a>(state: &'a mut StoreState, key: &CacheKey) -> Option<&'a mut CacheEntry<Self>> {
        match key {
            CacheKey::BidHistory { .. } => Some(state.bid_history.entry(key.clone()).or_default()),
            _ => None,
        }
    }

    fn peek<'a>(state: &'a StoreState, key: &CacheKey) -> Option<&'a CacheEntry<Self>> {
        state.bid_history.get(key)
    }

    fn dedup(dedups: &Dedups) -> &QueryDeduplicator<Self> {
        &dedups.bids
    }
}

impl Cached for Arc<UserCommitment> {
    fn slot<'a>(state: &'a mut StoreState, key: &CacheKey) -> Option<&'a mut CacheEntry<Self>> {
        match key {
            CacheKey::UserCommitment {
                auction_id,
                user_chain,
            } => Some(
                state
                    .commitments
                    .entry((*auction_id, user_chain.clone()))
                    .or_default(),
            ),
            _ => None,
        }
    }

    fn peek<'a>(state: &'a StoreState, key: &CacheKey) -> Option<&'a CacheEntry<Self>> {
        match key {
            CacheKey::UserCommitment {
                auction_id,
                user_chain,
            } => state.commitments.get(&(*auction_id, user_chain.clone())),
            _ => None,
        }
    }

    fn dedup(dedups: &Dedups) -> &QueryDeduplicator<Self> {
        &dedups.commitments
    }
}

impl Cached for Arc<Vec<AuctionCommitment>> {
    fn slot<'a>(state: &'a mut StoreState, key: &CacheKey) -> Option<&'a mut CacheEntry<Self>> {
        match key {
            CacheKey::AllMyCommitments { user_chain } => Some(
                state
                    .all_commitments
                    .entry(user_chain.clone())
                    .or_default(),
            ),
            _ => None,
        }
    }

    fn peek<'a>(state: &'a StoreState, key: &CacheKey) -> Option<&'a CacheEntry<Self>> {
        match key {
            CacheKey::AllMyCommitments { user_chain } => state.all_commitments.get(user_chain),
            _ => None,
        }
    }

    fn dedup(dedups: &Dedups) -> &QueryDeduplicator<Self> {
        &dedups.all_commitments
    }
}

impl Cached for IndexerState {
    fn slot<'a>(state: &'a mut StoreState, key: &CacheKey) -> Option<&'a mut CacheEntry<Self>> {
        match key {
            CacheKey::Indexer => Some(&mut state.indexer),
            _ => None,
        }
    }

    fn peek<'a>(state: &'a StoreState, key: &CacheKey) -> Option<&'a CacheEntry<Self>> {
        match key {
            CacheKey::Indexer => Some(&state.indexer),
            _ => None,
        }
    }

    fn dedup(dedups: &Dedups) -> &QueryDeduplicator<Self> {
        &dedups.indexer
    }
}

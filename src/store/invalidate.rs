//! Invalidation: reset timestamps, keep data and status.

use super::AuctionStore;
use crate::domain::{AuctionId, CacheKey, ChainId, ChangeKind, Owner};

impl AuctionStore {
    /// Marks one auction stale.
    pub fn invalidate_auction(&self, id: AuctionId) {
        let hit = match self.state().auctions.get_mut(&id) {
            Some(entry) => {
                entry.invalidate();
                true
            }
            None => false,
        };
        if hit {
            self.publish(CacheKey::AuctionSummary(id), ChangeKind::Invalidated);
        }
    }

    /// Marks every active-auction page stale, along with the fetch-all
    /// result they derive from.
    pub fn invalidate_active_auctions(&self) {
        self.invalidate_lists(|key| matches!(key, CacheKey::ActiveAuctions { .. }));
    }

    /// Marks every settled-auction page stale, along with the fetch-all
    /// result they derive from.
    pub fn invalidate_settled_auctions(&self) {
        self.invalidate_lists(|key| matches!(key, CacheKey::SettledAuctions { .. }));
    }

    /// Marks the by-creator pages of `creator` stale, or of every creator
    /// when `None`, along with the fetch-all result.
    pub fn invalidate_auctions_by_creator(&self, creator: Option<&Owner>) {
        self.invalidate_lists(|key| match key {
            CacheKey::AuctionsByCreator { creator: c, .. } => creator.is_none_or(|wanted| c == wanted),
            _ => false,
        });
    }

    /// Marks every cached bid-history page of an auction stale.
    pub fn invalidate_bid_history(&self, auction_id: AuctionId) {
        let keys: Vec<CacheKey> = {
            let mut state = self.state();
            state
                .bid_history
                .iter_mut()
                .filter(|(key, _)| {
                    matches!(key, CacheKey::BidHistory { auction_id: a, .. } if *a == auction_id)
                })
                .map(|(key, entry)| {
                    entry.invalidate();
                    key.clone()
                })
                .collect()
        };
        self.publish_invalidated(keys);
    }

    /// Marks commitments stale. `None` acts as a wildcard: `(Some(a), None)`
    /// hits auction `a` for every user, `(None, None)` hits everything.
    pub fn invalidate_user_commitment(&self, auction_id: Option<AuctionId>, user_chain: Option<&ChainId>) {
        let keys: Vec<CacheKey> = {
            let mut state = self.state();
            state
                .commitments
                .iter_mut()
                .filter(|((a, u), _)| {
                    auction_id.is_none_or(|wanted| *a == wanted)
                        && user_chain.is_none_or(|wanted| u == wanted)
                })
                .map(|((a, u), entry)| {
                    entry.invalidate();
                    CacheKey::UserCommitment {
                        auction_id: *a,
                        user_chain: u.clone(),
                    }
                })
                .collect()
        };
        self.publish_invalidated(keys);
    }

    /// Marks the all-commitments view of `user_chain` stale, or of every
    /// user when `None`.
    pub fn invalidate_all_my_commitments(&self, user_chain: Option<&ChainId>) {
        let keys: Vec<CacheKey> = {
            let mut state = self.state();
            state
                .all_commitments
                .iter_mut()
                .filter(|(u, _)| user_chain.is_none_or(|wanted| *u == wanted))
                .map(|(u, entry)| {
                    entry.invalidate();
                    CacheKey::AllMyCommitments {
                        user_chain: u.clone(),
                    }
                })
                .collect()
        };
        self.publish_invalidated(keys);
    }

    /// Marks every cached entry stale.
    pub fn invalidate_all(&self) {
        {
            let mut state = self.state();
            state.auctions.values_mut().for_each(|e| e.invalidate());
            state.all_auctions.invalidate();
            state.lists.values_mut().for_each(|l| l.entry.invalidate());
            state.bid_history.values_mut().for_each(|e| e.invalidate());
            state.commitments.values_mut().for_each(|e| e.invalidate());
            state.all_commitments.values_mut().for_each(|e| e.invalidate());
        }
        self.publish_all(ChangeKind::Invalidated);
        tracing::debug!("all cache entries invalidated");
    }

    fn invalidate_lists(&self, selects: impl Fn(&CacheKey) -> bool) {
        let mut keys: Vec<CacheKey> = {
            let mut state = self.state();
            state.all_auctions.invalidate();
            state
                .lists
                .iter_mut()
                .filter(|(key, _)| selects(key))
                .map(|(key, list)| {
                    list.entry.invalidate();
                    key.clone()
                })
                .collect()
        };
        keys.push(CacheKey::AllAuctions);
        self.publish_invalidated(keys);
    }

    fn publish_invalidated(&self, keys: Vec<CacheKey>) {
        for key in keys {
            tracing::debug!(%key, "invalidated");
            self.publish(key, ChangeKind::Invalidated);
        }
    }
}

//! Query handles and mutation handles over the [`AuctionStore`].
//!
//! A handle is what a view holds: [`Query::mount`] fetches when the cache
//! has nothing fresh, [`Query::state`] derives the view state from the
//! cache, [`Query::changed`] waits for the store to announce a relevant
//! write. Dropping the handle unmounts it.
//!
//! [`AuctionStore`]: crate::store::AuctionStore

mod mutations;
mod query;
mod sources;

use std::time::Duration;

use crate::domain::{CacheEntry, CacheStatus};
use crate::error::SyncError;

pub use mutations::{AuctionMutations, MutationCallbacks, MutationKind, MutationStatus, use_auction_mutations};
pub use query::{Query, QuerySource};
pub use sources::{
    ActiveAuctions, AllMyCommitments, AuctionSummary, AuctionsByCreator, BidHistory, Indexer,
    MyCommitment, SettledAuctions, use_active_auctions, use_all_my_commitments,
    use_auction_summary, use_auctions_by_creator, use_bid_history, use_indexer,
    use_my_commitment, use_settled_auctions,
};

/// What a view renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    /// Last known data, kept through refetches and failures.
    pub data: Option<T>,
    /// `true` only on first paint: nothing cached and a fetch in flight.
    pub loading: bool,
    /// `true` whenever a fetch is in flight.
    pub is_fetching: bool,
    /// Error of the last failed fetch.
    pub error: Option<SyncError>,
    /// `true` once any fetch has completed.
    pub has_loaded_once: bool,
    /// `true` when the entry is missing, idle or past its TTL.
    pub is_stale: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            is_fetching: false,
            error: None,
            has_loaded_once: false,
            is_stale: true,
        }
    }
}

impl<T> QueryState<T> {
    /// Derives the view state of a cache entry.
    #[must_use]
    pub fn from_entry(entry: CacheEntry<T>, is_stale: bool) -> Self {
        let is_fetching = entry.status == CacheStatus::Loading;
        Self {
            loading: is_fetching && entry.data.is_none(),
            is_fetching,
            has_loaded_once: entry.data.is_some() || entry.error.is_some(),
            data: entry.data,
            error: entry.error,
            is_stale,
        }
    }
}

/// Polling settings of a query handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOptions {
    /// Subscribe to the polling manager on mount.
    pub enabled: bool,
    /// Period; `None` uses the configured default for the resource.
    pub interval: Option<Duration>,
}

impl PollOptions {
    /// Polling with the resource's default period.
    #[must_use]
    pub const fn enabled() -> Self {
        Self {
            enabled: true,
            interval: None,
        }
    }

    /// Polling every `interval`.
    #[must_use]
    pub const fn every(interval: Duration) -> Self {
        Self {
            enabled: true,
            interval: Some(interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CacheEntry;

    #[test]
    fn first_paint_is_loading() {
        let mut entry = CacheEntry::<u32>::idle();
        entry.begin_loading();
        let state = QueryState::from_entry(entry, true);
        assert!(state.loading);
        assert!(state.is_fetching);
        assert!(!state.has_loaded_once);
    }

    #[test]
    fn refetch_with_data_is_not_loading() {
        let mut entry = CacheEntry::idle();
        entry.resolve_success(7_u32, 1_000, 1);
        entry.begin_loading();
        let state = QueryState::from_entry(entry, false);
        assert!(!state.loading);
        assert!(state.is_fetching);
        assert!(state.has_loaded_once);
        assert_eq!(state.data, Some(7));
    }

    #[test]
    fn failed_first_fetch_has_loaded_once() {
        let mut entry = CacheEntry::<u32>::idle();
        entry.begin_loading();
        entry.resolve_error(SyncError::Transport("down".into()), 1);
        let state = QueryState::from_entry(entry, true);
        assert!(!state.loading);
        assert!(state.has_loaded_once);
        assert!(state.error.is_some());
    }
}

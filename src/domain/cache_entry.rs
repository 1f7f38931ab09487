//! Cache entries and the keys that address them.
//!
//! Every cached resource goes through `Idle → Loading → {Success | Error}`
//! and may be driven back to `Loading` by a refetch. A `Loading` entry
//! keeps its previous data (stale-while-revalidate); invalidation only
//! resets `timestamp` to the `0` sentinel.

use std::fmt;
use std::sync::Arc;

use super::{AuctionId, ChainId, Owner};
use crate::error::SyncError;

/// Timestamp sentinel meaning "treat as stale".
pub const STALE_TIMESTAMP: i64 = 0;

/// Fetch state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    /// Never fetched.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last applied fetch succeeded.
    Success,
    /// The last applied fetch failed.
    Error,
}

/// Generic cache wrapper around any cached value.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Last successfully fetched value; survives refetches and failures.
    pub data: Option<T>,
    /// When `data` was last written, ms since epoch. `0` forces staleness.
    pub timestamp: i64,
    /// Fetch state.
    pub status: CacheStatus,
    /// Error of the last applied failed fetch.
    pub error: Option<SyncError>,
    applied_seq: u64,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            timestamp: STALE_TIMESTAMP,
            status: CacheStatus::Idle,
            error: None,
            applied_seq: 0,
        }
    }
}

impl<T> CacheEntry<T> {
    /// Creates an idle entry with no data.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// Marks a fetch as started. Data and error are left untouched.
    pub fn begin_loading(&mut self) {
        self.status = CacheStatus::Loading;
    }

    /// Applies a successful response stamped with `seq`.
    ///
    /// Returns `false` (and changes nothing) when a response with a newer
    /// sequence number has already been applied.
    pub fn resolve_success(&mut self, data: T, now_ms: i64, seq: u64) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        self.data = Some(data);
        self.timestamp = now_ms;
        self.status = CacheStatus::Success;
        self.error = None;
        true
    }

    /// Applies a failed response stamped with `seq`. Previous data is kept.
    ///
    /// Returns `false` when a newer response has already been applied.
    pub fn resolve_error(&mut self, error: SyncError, seq: u64) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        self.status = CacheStatus::Error;
        self.error = Some(error);
        true
    }

    /// Forces the next staleness check to report `true`.
    pub fn invalidate(&mut self) {
        self.timestamp = STALE_TIMESTAMP;
    }

    /// Staleness predicate: idle, or older than `ttl_ms`.
    #[must_use]
    pub fn is_stale(&self, now_ms: i64, ttl_ms: i64) -> bool {
        self.status == CacheStatus::Idle || now_ms.saturating_sub(self.timestamp) > ttl_ms
    }

    /// Returns `true` if a fetch is currently in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == CacheStatus::Loading
    }

    /// Same entry with its data projected through `f`.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            data: self.data.map(f),
            timestamp: self.timestamp,
            status: self.status,
            error: self.error,
            applied_seq: self.applied_seq,
        }
    }
}

/// List entry: a page of auction ID references into the normalized cache.
#[derive(Debug, Clone)]
pub struct ListCacheEntry {
    /// Page offset.
    pub offset: usize,
    /// Page size.
    pub limit: usize,
    /// The ID list with its fetch state.
    pub entry: CacheEntry<Arc<Vec<AuctionId>>>,
}

impl ListCacheEntry {
    /// Creates an idle list entry for the given page.
    #[must_use]
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            entry: CacheEntry::idle(),
        }
    }
}

/// Resource kind plus parameters; one per cache entry.
///
/// `Display` renders the deduplication key of the resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One auction.
    AuctionSummary(AuctionId),
    /// Metadata of the shared "fetch all auctions" primitive.
    AllAuctions,
    /// Page of active auctions.
    ActiveAuctions {
        /// Page offset.
        offset: usize,
        /// Page size.
        limit: usize,
    },
    /// Page of settled auctions.
    SettledAuctions {
        /// Page offset.
        offset: usize,
        /// Page size.
        limit: usize,
    },
    /// Page of auctions created by one account.
    AuctionsByCreator {
        /// Creator account.
        creator: Owner,
        /// Page offset.
        offset: usize,
        /// Page size.
        limit: usize,
    },
    /// Page of an auction's bid history.
    BidHistory {
        /// Auction the bids belong to.
        auction_id: AuctionId,
        /// Page offset.
        offset: usize,
        /// Page size.
        limit: usize,
    },
    /// A user's commitment in one auction.
    UserCommitment {
        /// Auction.
        auction_id: AuctionId,
        /// User chain.
        user_chain: ChainId,
    },
    /// All of a user's commitments.
    AllMyCommitments {
        /// User chain.
        user_chain: ChainId,
    },
    /// Indexer bootstrap state.
    Indexer,
}

impl CacheKey {
    /// Returns the auction this key is scoped to, if any.
    #[must_use]
    pub const fn auction_id(&self) -> Option<AuctionId> {
        match self {
            Self::AuctionSummary(id)
            | Self::BidHistory { auction_id: id, .. }
            | Self::UserCommitment { auction_id: id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Returns `true` for the list views derived from the shared auction cache.
    #[must_use]
    pub const fn is_auction_list(&self) -> bool {
        matches!(
            self,
            Self::AllAuctions
                | Self::ActiveAuctions { .. }
                | Self::SettledAuctions { .. }
                | Self::AuctionsByCreator { .. }
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuctionSummary(id) => write!(f, "auction-summary-{id}"),
            Self::AllAuctions => f.write_str("all-auctions"),
            Self::ActiveAuctions { offset, limit } => write!(f, "active-auctions-{offset}-{limit}"),
            Self::SettledAuctions { offset, limit } => {
                write!(f, "settled-auctions-{offset}-{limit}")
            }
            Self::AuctionsByCreator {
                creator,
                offset,
                limit,
            } => write!(f, "auctions-by-creator-{creator}-{offset}-{limit}"),
            Self::BidHistory {
                auction_id,
                offset,
                limit,
            } => write!(f, "bid-history-{auction_id}-{offset}-{limit}"),
            Self::UserCommitment {
                auction_id,
                user_chain,
            } => write!(f, "my-commitment-{auction_id}-{user_chain}"),
            Self::AllMyCommitments { user_chain } => write!(f, "all-my-commitments-{user_chain}"),
            Self::Indexer => f.write_str("initialize-indexer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: i64 = 6_000;

    #[test]
    fn loading_keeps_previous_data() {
        let mut entry = CacheEntry::idle();
        assert!(entry.resolve_success("v1", 1_000, 1));

        entry.begin_loading();
        assert_eq!(entry.status, CacheStatus::Loading);
        assert_eq!(entry.data, Some("v1"));
    }

    #[test]
    fn error_keeps_previous_data() {
        let mut entry = CacheEntry::idle();
        assert!(entry.resolve_success("v1", 1_000, 1));
        entry.begin_loading();
        assert!(entry.resolve_error(SyncError::Transport("down".to_string()), 2));

        assert_eq!(entry.status, CacheStatus::Error);
        assert_eq!(entry.data, Some("v1"));
        assert!(entry.error.is_some());
    }

    #[test]
    fn success_clears_error() {
        let mut entry = CacheEntry::idle();
        assert!(entry.resolve_error(SyncError::Transport("down".to_string()), 1));
        assert!(entry.resolve_success("v1", 1_000, 2));
        assert!(entry.error.is_none());
    }

    #[test]
    fn older_response_is_discarded() {
        let mut entry = CacheEntry::idle();
        assert!(entry.resolve_success("newer", 2_000, 2));
        assert!(!entry.resolve_success("older", 2_500, 1));
        assert!(!entry.resolve_error(SyncError::Transport("late".to_string()), 1));

        assert_eq!(entry.data, Some("newer"));
        assert_eq!(entry.timestamp, 2_000);
        assert_eq!(entry.status, CacheStatus::Success);
    }

    #[test]
    fn invalidation_only_resets_timestamp() {
        let mut entry = CacheEntry::idle();
        assert!(entry.resolve_success("v1", 10_000, 1));
        assert!(!entry.is_stale(10_001, TTL));

        entry.invalidate();
        assert_eq!(entry.timestamp, STALE_TIMESTAMP);
        assert_eq!(entry.status, CacheStatus::Success);
        assert_eq!(entry.data, Some("v1"));
        assert!(entry.is_stale(10_001, TTL));
    }

    #[test]
    fn ttl_boundary() {
        let now = 1_000_000;
        let mut past = CacheEntry::idle();
        assert!(past.resolve_success((), now - TTL - 1, 1));
        assert!(past.is_stale(now, TTL));

        let mut fresh = CacheEntry::idle();
        assert!(fresh.resolve_success((), now - TTL + 1, 1));
        assert!(!fresh.is_stale(now, TTL));
    }

    #[test]
    fn idle_entry_is_stale() {
        let entry: CacheEntry<()> = CacheEntry::idle();
        assert!(entry.is_stale(0, TTL));
    }

    #[test]
    fn keys_render_dedup_strings() {
        assert_eq!(
            CacheKey::AuctionSummary(AuctionId::new(42)).to_string(),
            "auction-summary-42"
        );
        assert_eq!(
            CacheKey::BidHistory {
                auction_id: AuctionId::new(42),
                offset: 0,
                limit: 50
            }
            .to_string(),
            "bid-history-42-0-50"
        );
        assert_eq!(
            CacheKey::UserCommitment {
                auction_id: AuctionId::new(7),
                user_chain: ChainId::new("u1")
            }
            .auction_id(),
            Some(AuctionId::new(7))
        );
    }
}

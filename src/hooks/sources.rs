//! One source per cached resource, plus the `use_*` constructors.

use std::sync::Arc;
use std::time::Duration;

use super::{PollOptions, Query, QuerySource};
use crate::app_state::AppState;
use crate::config::PollIntervals;
use crate::domain::{
    Auction, AuctionCommitment, AuctionId, BidRecord, CacheEntry, CacheKey, IndexerState, Owner,
    UserCommitment, WalletSession,
};
use crate::error::SyncError;
use crate::store::AuctionStore;

fn required<T>(value: Option<T>, name: &str) -> Result<T, SyncError> {
    value.ok_or_else(|| SyncError::InvalidInput(format!("{name} is required")))
}

fn read_list(store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Vec<Arc<Auction>>>> {
    store
        .list(key)
        .map(|list| list.entry.map(|ids| store.resolve_auctions(&ids)))
}

/// One auction by ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionSummary {
    /// Auction to watch; `None` skips.
    pub id: Option<AuctionId>,
}

impl QuerySource for AuctionSummary {
    type Data = Arc<Auction>;

    fn key(&self, _: &WalletSession) -> Result<CacheKey, SyncError> {
        required(self.id, "auction id").map(CacheKey::AuctionSummary)
    }

    fn read(&self, store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Self::Data>> {
        match key {
            CacheKey::AuctionSummary(id) => store.auction(*id),
            _ => None,
        }
    }

    fn poll_interval(&self, intervals: &PollIntervals) -> Duration {
        intervals.auction_summary
    }
}

/// Page of active auctions, resolved to records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveAuctions {
    /// Page offset.
    pub offset: usize,
    /// Page size.
    pub limit: usize,
}

impl QuerySource for ActiveAuctions {
    type Data = Vec<Arc<Auction>>;

    fn key(&self, _: &WalletSession) -> Result<CacheKey, SyncError> {
        Ok(CacheKey::ActiveAuctions {
            offset: self.offset,
            limit: self.limit,
        })
    }

    fn read(&self, store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Self::Data>> {
        read_list(store, key)
    }

    fn poll_interval(&self, intervals: &PollIntervals) -> Duration {
        intervals.auction_list
    }
}

/// Page of settled auctions, resolved to records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledAuctions {
    /// Page offset.
    pub offset: usize,
    /// Page size.
    pub limit: usize,
}

impl QuerySource for SettledAuctions {
    type Data = Vec<Arc<Auction>>;

    fn key(&self, _: &WalletSession) -> Result<CacheKey, SyncError> {
        Ok(CacheKey::SettledAuctions {
            offset: self.offset,
            limit: self.limit,
        })
    }

    fn read(&self, store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Self::Data>> {
        read_list(store, key)
    }

    fn poll_interval(&self, intervals: &PollIntervals) -> Duration {
        intervals.auction_list
    }
}

/// Page of one creator's auctions, resolved to records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionsByCreator {
    /// Creator; `None` skips.
    pub creator: Option<Owner>,
    /// Page offset.
    pub offset: usize,
    /// Page size.
    pub limit: usize,
}

impl QuerySource for AuctionsByCreator {
    type Data = Vec<Arc<Auction>>;

    fn key(&self, _: &WalletSession) -> Result<CacheKey, SyncError> {
        Ok(CacheKey::AuctionsByCreator {
            creator: required(self.creator.clone(), "creator")?,
            offset: self.offset,
            limit: self.limit,
        })
    }

    fn read(&self, store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Self::Data>> {
        read_list(store, key)
    }

    fn poll_interval(&self, intervals: &PollIntervals) -> Duration {
        intervals.auction_list
    }
}

/// Page of an auction's bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidHistory {
    /// Auction; `None` skips.
    pub auction_id: Option<AuctionId>,
    /// Page offset.
    pub offset: usize,
    /// Page size.
    pub limit: usize,
}

impl QuerySource for BidHistory {
    type Data = Arc<Vec<BidRecord>>;

    fn key(&self, _: &WalletSession) -> Result<CacheKey, SyncError> {
        Ok(CacheKey::BidHistory {
            auction_id: required(self.auction_id, "auction id")?,
            offset: self.offset,
            limit: self.limit,
        })
    }

    fn read(&self, store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Self::Data>> {
        match key {
            CacheKey::BidHistory {
                auction_id,
                offset,
                limit,
            } => store.bid_history(*auction_id, *offset, *limit),
            _ => None,
        }
    }

    fn poll_interval(&self, intervals: &PollIntervals) -> Duration {
        intervals.bid_history
    }
}

/// The connected user's commitment in one auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MyCommitment {
    /// Auction; `None` skips.
    pub auction_id: Option<AuctionId>,
}

impl QuerySource for MyCommitment {
    type Data = Arc<UserCommitment>;

    fn key(&self, wallet: &WalletSession) -> Result<CacheKey, SyncError> {
        let auction_id = required(self.auction_id, "auction id")?;
        Ok(CacheKey::UserCommitment {
            auction_id,
            user_chain: wallet.ready_chain()?.clone(),
        })
    }

    fn read(&self, store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Self::Data>> {
        match key {
            CacheKey::UserCommitment {
                auction_id,
                user_chain,
            } => store.commitment(*auction_id, user_chain),
            _ => None,
        }
    }

    fn poll_interval(&self, intervals: &PollIntervals) -> Duration {
        intervals.commitment
    }
}

/// Every commitment of the connected user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllMyCommitments;

impl QuerySource for AllMyCommitments {
    type Data = Arc<Vec<AuctionCommitment>>;

    fn key(&self, wallet: &WalletSession) -> Result<CacheKey, SyncError> {
        Ok(CacheKey::AllMyCommitments {
            user_chain: wallet.ready_chain()?.clone(),
        })
    }

    fn read(&self, store: &AuctionStore, key: &CacheKey) -> Option<CacheEntry<Self::Data>> {
        match key {
            CacheKey::AllMyCommitments { user_chain } => store.all_my_commitments(user_chain),
            _ => None,
        }
    }

    fn poll_interval(&self, intervals: &PollIntervals) -> Duration {
        intervals.commitment
    }
}

/// Indexer bootstrap state. Mounting bootstraps the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Indexer;

impl QuerySource for Indexer {
    type Data = IndexerState;

    fn key(&self, _: &WalletSession) -> Result<CacheKey, SyncError> {
        Ok(CacheKey::Indexer)
    }

    fn read(&self, store: &AuctionStore, _: &CacheKey) -> Option<CacheEntry<Self::Data>> {
        let entry = store.indexer();
        let state = store.indexer_state();
        Some(entry.map(|_| state))
    }

    fn poll_interval(&self, intervals: &PollIntervals) -> Duration {
        intervals.auction_list
    }
}

/// Handle over one auction.
#[must_use]
pub fn use_auction_summary(
    app: &AppState,
    id: Option<AuctionId>,
    poll: PollOptions,
) -> Query<AuctionSummary> {
    Query::new(app, AuctionSummary { id }, poll)
}

/// Handle over a page of active auctions.
#[must_use]
pub fn use_active_auctions(
    app: &AppState,
    offset: usize,
    limit: usize,
    poll: PollOptions,
) -> Query<ActiveAuctions> {
    Query::new(app, ActiveAuctions { offset, limit }, poll)
}

/// Handle over a page of settled auctions.
#[must_use]
pub fn use_settled_auctions(
    app: &AppState,
    offset: usize,
    limit: usize,
    poll: PollOptions,
) -> Query<SettledAuctions> {
    Query::new(app, SettledAuctions { offset, limit }, poll)
}

/// Handle over a page of one creator's auctions.
#[must_use]
pub fn use_auctions_by_creator(
    app: &AppState,
    creator: Option<Owner>,
    offset: usize,
    limit: usize,
    poll: PollOptions,
) -> Query<AuctionsByCreator> {
    let source = AuctionsByCreator {
        creator,
        offset,
        limit,
    };
    Query::new(app, source, poll)
}

/// Handle over a page of bid history.
#[must_use]
pub fn use_bid_history(
    app: &AppState,
    auction_id: Option<AuctionId>,
    offset: usize,
    limit: usize,
    poll: PollOptions,
) -> Query<BidHistory> {
    let source = BidHistory {
        auction_id,
        offset,
        limit,
    };
    Query::new(app, source, poll)
}

/// Handle over the connected user's commitment in one auction.
#[must_use]
pub fn use_my_commitment(
    app: &AppState,
    auction_id: Option<AuctionId>,
    poll: PollOptions,
) -> Query<MyCommitment> {
    Query::new(app, MyCommitment { auction_id }, poll)
}

/// Handle over every commitment of the connected user.
#[must_use]
pub fn use_all_my_commitments(app: &AppState, poll: PollOptions) -> Query<AllMyCommitments> {
    Query::new(app, AllMyCommitments, poll)
}

/// Handle over the indexer bootstrap state. Never polls.
#[must_use]
pub fn use_indexer(app: &AppState) -> Query<Indexer> {
    Query::new(app, Indexer, PollOptions::default())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::client::dto::fixtures::{auction_json, commitment_json};
    use crate::config::SyncConfig;
    use crate::domain::{AuctionStatus, ChainId, IndexerStatus};
    use crate::test_support::Harness;

    fn app(h: &Harness) -> AppState {
        AppState::with_store(h.store.clone(), &SyncConfig::default())
    }

    #[tokio::test]
    async fn mount_fetches_then_serves_from_cache() {
        let h = Harness::new();
        h.client.respond("auctionInfo", auction_json(42, "Active"));
        let app = app(&h);

        let mut first = use_auction_summary(&app, Some(AuctionId::new(42)), PollOptions::default());
        first.mount().await;
        let mut second = use_auction_summary(&app, Some(AuctionId::new(42)), PollOptions::default());
        second.mount().await;

        assert_eq!(h.client.calls("auctionInfo"), 1);
        let state = second.state();
        assert!(state.has_loaded_once);
        assert!(!state.loading);
        assert!(!state.is_stale);
        assert_eq!(state.data.map(|a| a.status), Some(AuctionStatus::Active));
    }

    #[tokio::test]
    async fn missing_parameter_skips() {
        let h = Harness::new();
        let app = app(&h);

        let mut query = use_auction_summary(&app, None, PollOptions::enabled());
        query.mount().await;

        assert!(query.key().is_none());
        assert!(!query.is_polling());
        assert!(h.client.recorded().is_empty());
        assert!(matches!(query.state().error, Some(SyncError::InvalidInput(_))));
        assert!(matches!(query.refetch().await, Err(SyncError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn user_queries_wait_for_a_ready_wallet() {
        let h = Harness::new();
        h.client
            .respond("myCommitmentForAuction", commitment_json(4));
        let app = app(&h);

        let mut query = use_my_commitment(&app, Some(AuctionId::new(42)), PollOptions::default());
        query.mount().await;
        assert!(query.key().is_none());

        app.set_wallet(WalletSession {
            chain_id: Some(ChainId::new("user-1")),
            owner: None,
            syncing: true,
        });
        query.mount().await;
        assert!(query.key().is_none());
        assert_eq!(query.refetch().await, Err(SyncError::WalletSyncing));

        app.set_wallet(WalletSession::connected(ChainId::new("user-1"), None));
        query.mount().await;
        assert_eq!(query.state().data.map(|c| c.total_quantity), Some(4));
        assert_eq!(h.client.calls("myCommitmentForAuction"), 1);
    }

    #[tokio::test]
    async fn list_handles_resolve_records() {
        let h = Harness::new();
        h.client.respond(
            "allAuctions",
            json!([auction_json(2, "Settled"), auction_json(1, "Active")]),
        );
        let app = app(&h);

        let mut active = use_active_auctions(&app, 0, 10, PollOptions::default());
        active.mount().await;
        let mut settled = use_settled_auctions(&app, 0, 10, PollOptions::default());
        settled.mount().await;

        let active_ids: Vec<AuctionId> = active
            .state()
            .data
            .unwrap_or_default()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(active_ids, vec![AuctionId::new(1)]);
        assert_eq!(settled.state().data.map(|rows| rows.len()), Some(1));
        assert_eq!(h.client.calls("allAuctions"), 1);
    }

    #[tokio::test]
    async fn by_creator_without_creator_skips() {
        let h = Harness::new();
        let app = app(&h);
        let mut query = use_auctions_by_creator(&app, None, 0, 10, PollOptions::default());
        query.mount().await;
        assert!(query.key().is_none());
        let state = query.state();
        assert_eq!(state.data, None);
        assert!(!state.is_fetching);
        assert!(matches!(state.error, Some(SyncError::InvalidInput(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_is_shared_and_released_on_drop() {
        let h = Harness::new();
        h.client.respond("auctionInfo", auction_json(42, "Active"));
        let app = app(&h);
        let every = PollOptions::every(Duration::from_millis(500));

        let mut a = use_auction_summary(&app, Some(AuctionId::new(42)), every);
        a.mount().await;
        let mut b = use_auction_summary(&app, Some(AuctionId::new(42)), every);
        b.mount().await;
        assert_eq!(app.polling.active_timers(), 1);
        assert_eq!(app.polling.subscriber_count("auction-summary-42"), 2);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(h.client.calls("auctionInfo"), 3);

        drop(a);
        assert_eq!(app.polling.active_timers(), 1);
        b.unmount();
        assert_eq!(app.polling.active_timers(), 0);
    }

    #[tokio::test]
    async fn set_source_rekeys() {
        let h = Harness::new();
        h.client.respond("auctionInfo", auction_json(1, "Active"));
        let app = app(&h);

        let mut query = use_auction_summary(&app, Some(AuctionId::new(1)), PollOptions::default());
        query.mount().await;
        query
            .set_source(AuctionSummary {
                id: Some(AuctionId::new(2)),
            })
            .await;

        assert_eq!(query.key(), Some(&CacheKey::AuctionSummary(AuctionId::new(2))));
        assert_eq!(h.client.calls("auctionInfo"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_refetches_a_mounted_handle() {
        let h = Harness::new();
        h.client.respond("auctionInfo", auction_json(42, "Active"));
        let app = app(&h);
        let mut query = use_auction_summary(&app, Some(AuctionId::new(42)), PollOptions::default());
        query.mount().await;
        assert_eq!(h.client.calls("auctionInfo"), 1);

        app.store.invalidate_auction(AuctionId::new(7));
        app.store.invalidate_auction(AuctionId::new(42));

        let waited = tokio::time::timeout(Duration::from_secs(1), query.changed()).await;
        assert!(waited.is_ok());
        assert!(query.state().data.is_some());

        let settled = tokio::time::timeout(Duration::from_secs(1), async {
            while query.state().is_stale {
                query.changed().await;
            }
        })
        .await;
        assert!(settled.is_ok());
        assert_eq!(h.client.calls("auctionInfo"), 2);
        assert_eq!(query.state().data.map(|a| a.status), Some(AuctionStatus::Active));
    }

    #[tokio::test]
    async fn wallet_ready_remounts_a_skipped_handle() {
        let h = Harness::new();
        h.client
            .respond("myCommitmentForAuction", commitment_json(3));
        let app = app(&h);
        app.set_wallet(WalletSession {
            chain_id: Some(ChainId::new("user-1")),
            owner: None,
            syncing: true,
        });

        let mut query = use_my_commitment(&app, Some(AuctionId::new(42)), PollOptions::default());
        query.mount().await;
        assert_eq!(query.state().error, Some(SyncError::WalletSyncing));
        assert_eq!(h.client.calls("myCommitmentForAuction"), 0);

        app.set_wallet(WalletSession::connected(ChainId::new("user-1"), None));
        let waited = tokio::time::timeout(Duration::from_secs(1), query.changed()).await;
        assert!(waited.is_ok());

        assert!(query.key().is_some());
        assert_eq!(h.client.calls("myCommitmentForAuction"), 1);
        let state = query.state();
        assert_eq!(state.error, None);
        assert_eq!(state.data.map(|c| c.total_quantity), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_wallet_change_keeps_public_handles_mounted() {
        let h = Harness::new();
        h.client.respond("auctionInfo", auction_json(42, "Active"));
        let app = app(&h);
        let mut query = use_auction_summary(&app, Some(AuctionId::new(42)), PollOptions::default());
        query.mount().await;

        app.set_wallet(WalletSession::connected(ChainId::new("user-1"), None));
        let waited = tokio::time::timeout(Duration::from_millis(200), query.changed()).await;
        assert!(waited.is_err());
        assert_eq!(h.client.calls("auctionInfo"), 1);
    }

    #[tokio::test]
    async fn refetch_reports_and_records_errors() {
        let h = Harness::new();
        h.client.respond("auctionInfo", auction_json(42, "Active"));
        let app = app(&h);
        let mut query = use_auction_summary(&app, Some(AuctionId::new(42)), PollOptions::default());
        query.mount().await;

        let failure = SyncError::Transport("reset".to_string());
        h.client.fail_once("auctionInfo", failure.clone());
        assert_eq!(query.refetch().await, Err(failure.clone()));

        let state = query.state();
        assert_eq!(state.error, Some(failure));
        assert!(state.data.is_some());
        assert!(!state.is_fetching);
    }

    #[tokio::test]
    async fn indexer_handle_bootstraps_on_mount() {
        let h = Harness::new();
        h.client.respond(
            "subscriptionInfo",
            json!({ "aacChain": "aac", "auctionApp": "auction", "initialized": true }),
        );
        let app = app(&h);

        let mut query = use_indexer(&app);
        assert_eq!(query.state().data, None);
        query.mount().await;

        let Some(state) = query.state().data else {
            panic!("indexer state missing");
        };
        assert_eq!(state.status, IndexerStatus::Verified);
        assert!(!query.is_polling());
    }
}

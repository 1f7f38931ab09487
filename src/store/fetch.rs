//! Fetch operations: remote read, normalization, cache write.

use std::sync::Arc;

use super::{AuctionStore, FetchMode};
use crate::client::dto::{AuctionCommitmentDto, AuctionDto, BidDto, CommitmentDto};
use crate::client::{AppTarget, decode_field, decode_optional_field, operations};
use crate::domain::{
    Auction, AuctionCommitment, AuctionId, AuctionStatus, BidRecord, CacheKey, ChainId,
    ChangeKind, Owner, UserCommitment,
};
use crate::error::SyncError;

impl AuctionStore {
    /// Fetches one auction (`auctionInfo`) into the normalized map.
    ///
    /// With [`FetchMode::IfStale`] a fresh cached record is returned as is,
    /// without a network call.
    ///
    /// # Errors
    ///
    /// Returns the remote or decoding error; the entry keeps its previous
    /// data and records the error. An unknown auction is reported as
    /// [`SyncError::NullPayload`].
    pub async fn fetch_auction_summary(
        &self,
        id: AuctionId,
        mode: FetchMode,
    ) -> Result<Arc<Auction>, SyncError> {
        self.fetch_entry(CacheKey::AuctionSummary(id), mode, move |store, _| async move {
            let request = operations::auction_info(id);
            let raw = store.inner.client.query(&AppTarget::Authority, &request).await?;
            let dto: AuctionDto = decode_field(&raw, request.field())?;
            let auction = Auction::try_from(dto)?;
            let previous = store.auction(id).and_then(|entry| entry.data);
            Ok(merge_auction(previous.as_ref(), auction))
        })
        .await
    }

    /// The shared "fetch all auctions" primitive every list view derives
    /// from. Writes each auction into the normalized map and returns every
    /// known ID, newest first.
    ///
    /// With [`FetchMode::IfStale`] a result younger than the list TTL is
    /// returned without a network call.
    ///
    /// # Errors
    ///
    /// Returns the remote or decoding error.
    pub async fn fetch_all_auctions(&self, mode: FetchMode) -> Result<Arc<Vec<AuctionId>>, SyncError> {
        let limit = self.inner.all_auctions_limit;
        self.fetch_entry(CacheKey::AllAuctions, mode, move |store, seq| async move {
            let request = operations::all_auctions(0, limit);
            let raw = store.inner.client.query(&AppTarget::Authority, &request).await?;
            let dtos: Vec<AuctionDto> =
                decode_optional_field(&raw, request.field())?.unwrap_or_default();
            let auctions = dtos
                .into_iter()
                .map(Auction::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(count = auctions.len(), "fetched auctions");
            Ok(store.absorb_auctions(auctions, seq))
        })
        .await
    }

    /// Page of auctions with status `Active`.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying fetch-all.
    pub async fn fetch_active_auctions(
        &self,
        offset: usize,
        limit: usize,
        mode: FetchMode,
    ) -> Result<Arc<Vec<AuctionId>>, SyncError> {
        self.fetch_list(CacheKey::ActiveAuctions { offset, limit }, mode)
            .await
    }

    /// Page of auctions with status `Settled`.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying fetch-all.
    pub async fn fetch_settled_auctions(
        &self,
        offset: usize,
        limit: usize,
        mode: FetchMode,
    ) -> Result<Arc<Vec<AuctionId>>, SyncError> {
        self.fetch_list(CacheKey::SettledAuctions { offset, limit }, mode)
            .await
    }

    /// Page of auctions created by `creator`, any status.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying fetch-all.
    pub async fn fetch_auctions_by_creator(
        &self,
        creator: &Owner,
        offset: usize,
        limit: usize,
        mode: FetchMode,
    ) -> Result<Arc<Vec<AuctionId>>, SyncError> {
        let key = CacheKey::AuctionsByCreator {
            creator: creator.clone(),
            offset,
            limit,
        };
        self.fetch_list(key, mode).await
    }

    /// Page of an auction's bid history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the remote or decoding error.
    pub async fn fetch_bid_history(
        &self,
        auction_id: AuctionId,
        offset: usize,
        limit: usize,
        mode: FetchMode,
    ) -> Result<Arc<Vec<BidRecord>>, SyncError> {
        let key = CacheKey::BidHistory {
            auction_id,
            offset,
            limit,
        };
        self.fetch_entry(key, mode, move |store, _| async move {
            let request = operations::bid_history(auction_id, offset, limit);
            let raw = store.inner.client.query(&AppTarget::Authority, &request).await?;
            let dtos: Vec<BidDto> =
                decode_optional_field(&raw, request.field())?.unwrap_or_default();
            Ok(Arc::new(dtos.into_iter().map(BidRecord::from).collect()))
        })
        .await
    }

    /// The user's commitment in one auction, read from the user chain. No
    /// commitment yet is an empty (zero-quantity) commitment.
    ///
    /// # Errors
    ///
    /// Returns the remote or decoding error.
    pub async fn fetch_my_commitment(
        &self,
        auction_id: AuctionId,
        user_chain: &ChainId,
        mode: FetchMode,
    ) -> Result<Arc<UserCommitment>, SyncError> {
        let target = AppTarget::User(user_chain.clone());
        let key = CacheKey::UserCommitment {
            auction_id,
            user_chain: user_chain.clone(),
        };
        self.fetch_entry(key, mode, move |store, _| async move {
            let request = operations::my_commitment_for_auction(auction_id);
            let raw = store.inner.client.query(&target, &request).await?;
            let dto: Option<CommitmentDto> = decode_optional_field(&raw, request.field())?;
            Ok(Arc::new(dto.map(UserCommitment::from).unwrap_or_default()))
        })
        .await
    }

    /// Every commitment of the user, read from the user chain.
    ///
    /// # Errors
    ///
    /// Returns the remote or decoding error.
    pub async fn fetch_all_my_commitments(
        &self,
        user_chain: &ChainId,
        mode: FetchMode,
    ) -> Result<Arc<Vec<AuctionCommitment>>, SyncError> {
        let target = AppTarget::User(user_chain.clone());
        let key = CacheKey::AllMyCommitments {
            user_chain: user_chain.clone(),
        };
        self.fetch_entry(key, mode, move |store, _| async move {
            let request = operations::my_auction_commitment();
            let raw = store.inner.client.query(&target, &request).await?;
            let dtos: Vec<AuctionCommitmentDto> =
                decode_optional_field(&raw, request.field())?.unwrap_or_default();
            Ok(Arc::new(
                dtos.into_iter().map(AuctionCommitment::from).collect(),
            ))
        })
        .await
    }

    /// Fetches whatever `key` addresses. Used by query handles and poll
    /// callbacks, which only know the key.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying fetch.
    pub async fn refresh(&self, key: &CacheKey, mode: FetchMode) -> Result<(), SyncError> {
        match key {
            CacheKey::AuctionSummary(id) => self.fetch_auction_summary(*id, mode).await.map(drop),
            CacheKey::AllAuctions => self.fetch_all_auctions(mode).await.map(drop),
            CacheKey::ActiveAuctions { offset, limit } => self
                .fetch_active_auctions(*offset, *limit, mode)
                .await
                .map(drop),
            CacheKey::SettledAuctions { offset, limit } => self
                .fetch_settled_auctions(*offset, *limit, mode)
                .await
                .map(drop),
            CacheKey::AuctionsByCreator {
                creator,
                offset,
                limit,
            } => self
                .fetch_auctions_by_creator(creator, *offset, *limit, mode)
                .await
                .map(drop),
            CacheKey::BidHistory {
                auction_id,
                offset,
                limit,
            } => self
                .fetch_bid_history(*auction_id, *offset, *limit, mode)
                .await
                .map(drop),
            CacheKey::UserCommitment {
                auction_id,
                user_chain,
            } => self
                .fetch_my_commitment(*auction_id, user_chain, mode)
                .await
                .map(drop),
            CacheKey::AllMyCommitments { user_chain } => self
                .fetch_all_my_commitments(user_chain, mode)
                .await
                .map(drop),
            CacheKey::Indexer => self.initialize_indexer().await.map(drop),
        }
    }

    async fn fetch_list(
        &self,
        key: CacheKey,
        mode: FetchMode,
    ) -> Result<Arc<Vec<AuctionId>>, SyncError> {
        let list_key = key.clone();
        self.fetch_entry(key, mode, move |store, _| async move {
            let all = store.fetch_all_auctions(mode).await?;
            Ok(store.derive_list(&list_key, &all))
        })
        .await
    }

    /// Writes a batch of auctions from one fetch into the normalized map.
    fn absorb_auctions(&self, auctions: Vec<Auction>, seq: u64) -> Arc<Vec<AuctionId>> {
        let now = self.now_ms();
        let mut ids = Vec::with_capacity(auctions.len());
        let mut changed = Vec::new();
        {
            let mut state = self.state();
            for auction in auctions {
                let id = auction.id;
                ids.push(id);
                let entry = state.auctions.entry(id).or_default();
                let previous = entry.data.clone();
                let data = merge_auction(previous.as_ref(), auction);
                let differs = previous.is_none_or(|p| !Arc::ptr_eq(&p, &data));
                if entry.resolve_success(data, now, seq) && differs {
                    changed.push(id);
                }
            }
        }
        for id in changed {
            self.publish(CacheKey::AuctionSummary(id), ChangeKind::Updated);
        }
        Arc::new(ids)
    }

    /// Filters the fetch-all IDs through the normalized map and cuts the page.
    fn derive_list(&self, key: &CacheKey, all: &[AuctionId]) -> Arc<Vec<AuctionId>> {
        let (offset, limit) = match key {
            CacheKey::ActiveAuctions { offset, limit }
            | CacheKey::SettledAuctions { offset, limit }
            | CacheKey::AuctionsByCreator { offset, limit, .. } => (*offset, *limit),
            _ => (0, 0),
        };
        let state = self.state();
        let ids = all
            .iter()
            .copied()
            .filter(|id| {
                state
                    .auctions
                    .get(id)
                    .and_then(|entry| entry.data.as_deref())
                    .is_some_and(|auction| list_includes(key, auction))
            })
            .skip(offset)
            .take(limit)
            .collect();
        Arc::new(ids)
    }
}

fn list_includes(key: &CacheKey, auction: &Auction) -> bool {
    match key {
        CacheKey::ActiveAuctions { .. } => auction.status == AuctionStatus::Active,
        CacheKey::SettledAuctions { .. } => auction.status == AuctionStatus::Settled,
        CacheKey::AuctionsByCreator { creator, .. } => auction.creator == *creator,
        _ => false,
    }
}

/// Combines a fresh record with the cached one: a settled clearing price
/// never changes, and an identical record keeps its existing allocation.
fn merge_auction(previous: Option<&Arc<Auction>>, mut incoming: Auction) -> Arc<Auction> {
    let Some(previous) = previous else {
        return Arc::new(incoming);
    };
    if incoming.keep_settled_clearing_price(previous) {
        tracing::warn!(auction_id = %incoming.id, "ignored clearing price change on settled auction");
    }
    if **previous == incoming {
        Arc::clone(previous)
    } else {
        Arc::new(incoming)
    }
}

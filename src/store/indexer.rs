//! Indexer bootstrap: check, initialize, verify, reset.

use chrono::DateTime;

use super::{AuctionStore, FetchMode};
use crate::client::dto::SubscriptionInfoDto;
use crate::client::{decode_field, decode_optional_field, operations};
use crate::domain::{
    CacheEntry, CacheKey, CacheStatus, ChangeKind, IndexerState, IndexerStatus, SubscriptionInfo,
};
use crate::error::SyncError;
use crate::persistence::BootstrapRecord;

impl AuctionStore {
    /// Bootstraps the indexer once.
    ///
    /// Checks the remote subscription state first and adopts it when the
    /// indexer is already initialized. Otherwise runs the `initialize`
    /// system mutation and re-reads the subscription state; if that read
    /// cannot confirm the initialization the state becomes
    /// [`IndexerStatus::Optimistic`] and a warning is logged. An already
    /// initialized local state is returned without any remote call.
    ///
    /// # Errors
    ///
    /// Returns the error of the `initialize` mutation.
    pub async fn initialize_indexer(&self) -> Result<IndexerState, SyncError> {
        if let Some(state) = self.indexer().data.filter(IndexerState::initialized) {
            tracing::debug!(status = ?state.status, "indexer already bootstrapped");
            return Ok(state);
        }
        self.fetch_entry(CacheKey::Indexer, FetchMode::Always, |store, _| async move {
            store.bootstrap_indexer().await
        })
        .await
    }

    /// Re-syncs the local indexer state with the remote subscription state.
    ///
    /// # Errors
    ///
    /// Returns the remote or decoding error; local state is kept.
    pub async fn check_subscription_info(&self) -> Result<IndexerState, SyncError> {
        self.fetch_entry(CacheKey::Indexer, FetchMode::Always, |store, _| async move {
            let state = match store.query_subscription_info().await? {
                Some(info) if info.initialized => {
                    IndexerState::from_info(&info, IndexerStatus::Verified)
                }
                Some(info) => IndexerState::from_info(&info, IndexerStatus::Uninitialized),
                None => IndexerState::default(),
            };
            if state.initialized() {
                store.persist_bootstrap(&state).await;
            } else {
                store.forget_bootstrap().await;
            }
            Ok(state)
        })
        .await
    }

    /// Clears the local indexer state and the persisted bootstrap record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Persistence`] if the record cannot be removed.
    pub async fn reset_indexer(&self) -> Result<(), SyncError> {
        self.state().indexer = CacheEntry::idle();
        self.publish(CacheKey::Indexer, ChangeKind::Cleared);
        self.inner.records.clear().await?;
        tracing::info!("indexer bootstrap reset");
        Ok(())
    }

    /// Indexer state with the entry's fetch status folded in: in-flight
    /// bootstraps report [`IndexerStatus::Initializing`], failed ones
    /// [`IndexerStatus::Failed`].
    #[must_use]
    pub fn indexer_state(&self) -> IndexerState {
        let entry = self.indexer();
        let mut state = entry.data.unwrap_or_default();
        if !state.initialized() {
            match entry.status {
                CacheStatus::Loading => state.status = IndexerStatus::Initializing,
                CacheStatus::Error => state.status = IndexerStatus::Failed,
                CacheStatus::Idle | CacheStatus::Success => {}
            }
        }
        state
    }

    async fn bootstrap_indexer(&self) -> Result<IndexerState, SyncError> {
        let record = self.inner.records.load().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read bootstrap record");
            None
        });

        match self.query_subscription_info().await {
            Ok(Some(info)) if info.initialized => {
                let state = IndexerState::from_info(&info, IndexerStatus::Verified);
                self.persist_bootstrap(&state).await;
                tracing::info!(aac_chain = %info.aac_chain, "indexer already initialized");
                return Ok(state);
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(record) = record {
                    tracing::warn!(error = %e, "subscription check failed, using bootstrap record");
                    return Ok(record.to_state());
                }
                tracing::debug!(error = %e, "subscription check failed, initializing");
            }
        }

        let request = operations::initialize_indexer();
        let raw = self.inner.client.system_mutate(&request).await?;
        let _: serde_json::Value = decode_field(&raw, request.field())?;

        let state = match self.query_subscription_info().await {
            Ok(Some(info)) if info.initialized => {
                tracing::info!(aac_chain = %info.aac_chain, "indexer initialized");
                IndexerState::from_info(&info, IndexerStatus::Verified)
            }
            unverified => {
                let reason = match unverified {
                    Ok(_) => "not yet persisted".to_string(),
                    Err(e) => e.to_string(),
                };
                tracing::warn!(%reason, "indexer initialization unverified, assuming initialized");
                IndexerState {
                    aac_chain: Some(self.inner.aac_chain.clone()),
                    auction_app: Some(self.inner.auction_app_id.clone()),
                    status: IndexerStatus::Optimistic,
                }
            }
        };
        self.persist_bootstrap(&state).await;
        Ok(state)
    }

    async fn query_subscription_info(&self) -> Result<Option<SubscriptionInfo>, SyncError> {
        let request = operations::subscription_info();
        let raw = self.inner.client.system_query(&request).await?;
        let dto: Option<SubscriptionInfoDto> = decode_optional_field(&raw, request.field())?;
        Ok(dto.map(SubscriptionInfo::from))
    }

    async fn persist_bootstrap(&self, state: &IndexerState) {
        let recorded_at = DateTime::from_timestamp_millis(self.now_ms()).unwrap_or_default();
        let Some(record) = BootstrapRecord::from_state(state, recorded_at) else {
            return;
        };
        if let Err(e) = self.inner.records.save(&record).await {
            tracing::warn!(error = %e, "could not save bootstrap record");
        }
    }

    async fn forget_bootstrap(&self) {
        if let Err(e) = self.inner.records.clear().await {
            tracing::warn!(error = %e, "could not clear bootstrap record");
        }
    }
}

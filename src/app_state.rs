//! Application state handed to every query handle and mutation handle.

use std::sync::Arc;

use tokio::sync::watch;

use crate::client::ApplicationClient;
use crate::config::{PollIntervals, SyncConfig};
use crate::domain::WalletSession;
use crate::persistence::BootstrapRecordStore;
use crate::store::AuctionStore;
use crate::sync::PollingManager;

/// Store, poll timers and wallet session of one application instance.
///
/// Built once at startup and passed explicitly to the `use_*`
/// constructors; clones share everything. [`AppState::shutdown`] is the
/// explicit disposal.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Normalized cache.
    pub store: AuctionStore,
    /// Shared poll timers.
    pub polling: PollingManager,
    wallet: Arc<watch::Sender<WalletSession>>,
    poll_intervals: PollIntervals,
}

impl AppState {
    /// Builds the store over `client` and `records`.
    ///
    /// The wallet starts connected to `config.user_chain` when set.
    #[must_use]
    pub fn new(
        config: &SyncConfig,
        client: Arc<dyn ApplicationClient>,
        records: Arc<dyn BootstrapRecordStore>,
    ) -> Self {
        Self::with_store(AuctionStore::new(client, records, config), config)
    }

    /// Wraps an existing store.
    #[must_use]
    pub fn with_store(store: AuctionStore, config: &SyncConfig) -> Self {
        let session = config
            .user_chain
            .clone()
            .map(|chain| WalletSession::connected(chain, None))
            .unwrap_or_default();
        let (wallet, _) = watch::channel(session);
        Self {
            store,
            polling: PollingManager::new(),
            wallet: Arc::new(wallet),
            poll_intervals: config.poll_intervals,
        }
    }

    /// Current wallet session.
    #[must_use]
    pub fn wallet(&self) -> WalletSession {
        self.wallet.borrow().clone()
    }

    /// Replaces the wallet session. Mounted handles pick it up on their
    /// next mount or refetch.
    pub fn set_wallet(&self, session: WalletSession) {
        tracing::info!(
            chain = ?session.chain_id.as_ref().map(|c| c.as_str()),
            syncing = session.syncing,
            "wallet session changed"
        );
        self.wallet.send_replace(session);
    }

    /// Receiver that observes wallet session changes.
    #[must_use]
    pub fn watch_wallet(&self) -> watch::Receiver<WalletSession> {
        self.wallet.subscribe()
    }

    /// Default polling periods.
    #[must_use]
    pub const fn poll_intervals(&self) -> &PollIntervals {
        &self.poll_intervals
    }

    /// Stops every poll timer. In-flight fetches still complete.
    pub fn shutdown(&self) {
        self.polling.shutdown();
        tracing::info!("auction sync shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChainId;
    use crate::test_support::Harness;

    #[test]
    fn wallet_starts_from_config() {
        let config = SyncConfig {
            user_chain: Some(ChainId::new("user-1")),
            ..SyncConfig::default()
        };
        let h = Harness::with_config(&config);
        let app = AppState::with_store(h.store, &config);

        assert_eq!(app.wallet().chain_id, Some(ChainId::new("user-1")));
        assert!(app.wallet().ready_chain().is_ok());
    }

    #[test]
    fn wallet_changes_are_observable() {
        let h = Harness::new();
        let app = AppState::with_store(h.store, &SyncConfig::default());
        let watcher = app.watch_wallet();
        assert!(!watcher.borrow().is_connected());

        app.set_wallet(WalletSession::connected(ChainId::new("user-2"), None));
        assert!(watcher.borrow().is_connected());
        assert!(watcher.has_changed().is_ok_and(|changed| changed));
    }
}

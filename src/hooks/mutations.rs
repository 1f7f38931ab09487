//! Mutation handle: create, buy, claim, subscribe, unsubscribe.
//!
//! Every operation checks its preconditions before touching the network,
//! runs the mutation, asks the authority to process pending messages,
//! invalidates exactly the entries the mutation affects and reports the
//! outcome as a `bool`. Failures are kept in [`MutationStatus::error`],
//! logged and handed to the `on_error` callback.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::app_state::AppState;
use crate::client::{AppTarget, GraphQlRequest, operations};
use crate::domain::{AuctionId, ChainId, NewAuction, WalletSession};
use crate::error::SyncError;
use crate::store::AuctionStore;

/// Which mutation ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// `createAuction`.
    CreateAuction,
    /// `buy`.
    Buy,
    /// `claimSettlement`.
    ClaimSettlement,
    /// `subscribeToAuction`.
    Subscribe,
    /// `unsubscribeFromAuction`.
    Unsubscribe,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateAuction => "create-auction",
            Self::Buy => "buy",
            Self::ClaimSettlement => "claim-settlement",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        })
    }
}

/// In-flight flags and the last error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationStatus {
    /// `create_auction` in flight.
    pub is_creating: bool,
    /// `buy` in flight.
    pub is_buying: bool,
    /// `claim_settlement` in flight.
    pub is_claiming: bool,
    /// `subscribe_to_auction` in flight.
    pub is_subscribing: bool,
    /// `unsubscribe_from_auction` in flight.
    pub is_unsubscribing: bool,
    /// Error of the last failed mutation; cleared when the next one starts.
    pub error: Option<SyncError>,
}

impl MutationStatus {
    fn flag(&mut self, kind: MutationKind) -> &mut bool {
        match kind {
            MutationKind::CreateAuction => &mut self.is_creating,
            MutationKind::Buy => &mut self.is_buying,
            MutationKind::ClaimSettlement => &mut self.is_claiming,
            MutationKind::Subscribe => &mut self.is_subscribing,
            MutationKind::Unsubscribe => &mut self.is_unsubscribing,
        }
    }
}

/// Called after a successful mutation.
pub type SuccessCallback = Arc<dyn Fn(MutationKind) + Send + Sync>;

/// Called after a failed mutation.
pub type ErrorCallback = Arc<dyn Fn(MutationKind, &SyncError) + Send + Sync>;

/// Optional outcome callbacks.
#[derive(Clone, Default)]
pub struct MutationCallbacks {
    /// Success callback.
    pub on_success: Option<SuccessCallback>,
    /// Error callback.
    pub on_error: Option<ErrorCallback>,
}

impl fmt::Debug for MutationCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Resets the in-flight flag when the operation ends, cancelled or not.
struct Busy {
    status: Arc<Mutex<MutationStatus>>,
    kind: MutationKind,
}

impl Busy {
    fn start(status: &Arc<Mutex<MutationStatus>>, kind: MutationKind) -> Self {
        {
            let mut guard = lock(status);
            *guard.flag(kind) = true;
            guard.error = None;
        }
        Self {
            status: Arc::clone(status),
            kind,
        }
    }
}

impl Drop for Busy {
    fn drop(&mut self) {
        *lock(&self.status).flag(self.kind) = false;
    }
}

fn lock(status: &Mutex<MutationStatus>) -> MutexGuard<'_, MutationStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutation handle. Clones share flags and error.
#[derive(Debug, Clone)]
pub struct AuctionMutations {
    store: AuctionStore,
    wallet: watch::Receiver<WalletSession>,
    callbacks: MutationCallbacks,
    status: Arc<Mutex<MutationStatus>>,
}

/// Mutation handle bound to `app`'s store and wallet.
#[must_use]
pub fn use_auction_mutations(app: &AppState, callbacks: MutationCallbacks) -> AuctionMutations {
    AuctionMutations {
        store: app.store.clone(),
        wallet: app.watch_wallet(),
        callbacks,
        status: Arc::default(),
    }
}

impl AuctionMutations {
    /// Snapshot of the flags and last error.
    #[must_use]
    pub fn status(&self) -> MutationStatus {
        lock(&self.status).clone()
    }

    /// Creates an auction on the authority chain after validating
    /// `params`. Refreshes the active list and the creator's list.
    pub async fn create_auction(&self, params: &NewAuction) -> bool {
        self.run(MutationKind::CreateAuction, async {
            params.validate()?;
            self.ready_chain()?;
            self.store
                .mutate(&AppTarget::Authority, &operations::create_auction(params))
                .await?;
            self.flush().await;
            self.store.invalidate_active_auctions();
            self.store.invalidate_auctions_by_creator(Some(&params.creator));
            Ok(())
        })
        .await
    }

    /// Bids for `quantity` units at the current price.
    pub async fn buy(&self, auction_id: AuctionId, quantity: u64) -> bool {
        self.run(MutationKind::Buy, async {
            if quantity == 0 {
                return Err(SyncError::InvalidInput("quantity must be positive".to_string()));
            }
            let chain = self.ready_chain()?;
            self.store
                .mutate(&AppTarget::User(chain.clone()), &operations::buy(auction_id, quantity))
                .await?;
            self.flush().await;
            self.store.invalidate_auction(auction_id);
            self.store.invalidate_bid_history(auction_id);
            self.store.invalidate_user_commitment(Some(auction_id), Some(&chain));
            self.store.invalidate_all_my_commitments(Some(&chain));
            Ok(())
        })
        .await
    }

    /// Claims the allocation and refund of a settled auction.
    pub async fn claim_settlement(&self, auction_id: AuctionId) -> bool {
        self.run(MutationKind::ClaimSettlement, async {
            let chain = self.ready_chain()?;
            self.store
                .mutate(
                    &AppTarget::User(chain.clone()),
                    &operations::claim_settlement(auction_id),
                )
                .await?;
            self.flush().await;
            self.store.invalidate_auction(auction_id);
            self.store.invalidate_bid_history(auction_id);
            self.store.invalidate_user_commitment(Some(auction_id), Some(&chain));
            self.store.invalidate_all_my_commitments(Some(&chain));
            self.store.invalidate_settled_auctions();
            Ok(())
        })
        .await
    }

    /// Subscribes the user chain to the authority's auction events.
    pub async fn subscribe_to_auction(&self) -> bool {
        let request = operations::subscribe_to_auction(self.store.aac_chain());
        self.run(MutationKind::Subscribe, self.on_user_chain(request))
            .await
    }

    /// Unsubscribes the user chain from the authority's auction events.
    pub async fn unsubscribe_from_auction(&self) -> bool {
        let request = operations::unsubscribe_from_auction(self.store.aac_chain());
        self.run(MutationKind::Unsubscribe, self.on_user_chain(request))
            .await
    }

    async fn on_user_chain(&self, request: GraphQlRequest) -> Result<(), SyncError> {
        let chain = self.ready_chain()?;
        self.store.mutate(&AppTarget::User(chain), &request).await?;
        self.flush().await;
        self.store.invalidate_active_auctions();
        Ok(())
    }

    fn ready_chain(&self) -> Result<ChainId, SyncError> {
        self.wallet.borrow().ready_chain().cloned()
    }

    /// The mutation already succeeded; a failed trigger only delays
    /// propagation, so it is logged and the cache is invalidated anyway.
    async fn flush(&self) {
        if let Err(e) = self.store.trigger().await {
            tracing::warn!(error = %e, "trigger after mutation failed");
        }
    }

    async fn run<Fut>(&self, kind: MutationKind, work: Fut) -> bool
    where
        Fut: Future<Output = Result<(), SyncError>>,
    {
        let _busy = Busy::start(&self.status, kind);
        match work.await {
            Ok(()) => {
                tracing::info!(mutation = %kind, "mutation succeeded");
                if let Some(on_success) = &self.callbacks.on_success {
                    on_success(kind);
                }
                true
            }
            Err(e) => {
                tracing::error!(mutation = %kind, code = e.error_code(), error = %e, "mutation failed");
                lock(&self.status).error = Some(e.clone());
                if let Some(on_error) = &self.callbacks.on_error {
                    on_error(kind, &e);
                }
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio_test::{assert_pending, task};

    use super::*;
    use crate::client::dto::fixtures::{auction_json, bid_json, commitment_json};
    use crate::config::SyncConfig;
    use crate::domain::auction::fixtures::new_auction;
    use crate::domain::CacheKey;
    use crate::store::FetchMode;
    use crate::test_support::{Harness, T0};

    const A42: AuctionId = AuctionId::new(42);
    const A7: AuctionId = AuctionId::new(7);

    fn user() -> ChainId {
        ChainId::new("user-1")
    }

    fn connected(h: &Harness) -> AppState {
        let config = SyncConfig {
            user_chain: Some(user()),
            ..SyncConfig::default()
        };
        AppState::with_store(h.store.clone(), &config)
    }

    fn script_mutations(h: &Harness) {
        for field in ["createAuction", "buy", "claimSettlement", "subscribeToAuction", "trigger"] {
            h.client.respond(field, json!("ok"));
        }
    }

    async fn prime(h: &Harness, auction: AuctionId) {
        let store = &h.store;
        let _ = store.fetch_auction_summary(auction, FetchMode::IfStale).await;
        let _ = store.fetch_bid_history(auction, 0, 20, FetchMode::IfStale).await;
        let _ = store.fetch_my_commitment(auction, &user(), FetchMode::IfStale).await;
    }

    fn counter() -> (Arc<AtomicUsize>, ErrorCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback: ErrorCallback = Arc::new(move |_: MutationKind, _: &SyncError| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[tokio::test]
    async fn buy_invalidates_only_its_auction() {
        let h = Harness::new();
        script_mutations(&h);
        h.client.respond("auctionInfo", auction_json(42, "Active"));
        h.client.respond("bidHistory", json!([bid_json(1, 42, "user-1")]));
        h.client
            .respond("myCommitmentForAuction", commitment_json(1));
        h.client.respond("myAuctionCommitment", json!([]));
        prime(&h, A42).await;
        prime(&h, A7).await;
        let _ = h.store.fetch_all_my_commitments(&user(), FetchMode::IfStale).await;

        let app = connected(&h);
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());
        assert!(mutations.buy(A42, 2).await);

        assert!(h.store.is_stale(&CacheKey::AuctionSummary(A42)));
        assert!(h.store.bid_history(A42, 0, 20).is_some_and(|e| e.timestamp == 0));
        assert!(h.store.commitment(A42, &user()).is_some_and(|e| e.timestamp == 0));
        assert!(h.store.is_stale(&CacheKey::AllMyCommitments { user_chain: user() }));

        assert!(h.store.auction(A7).is_some_and(|e| e.timestamp == T0));
        assert!(h.store.bid_history(A7, 0, 20).is_some_and(|e| e.timestamp == T0));
        assert!(h.store.commitment(A7, &user()).is_some_and(|e| e.timestamp == T0));

        assert_eq!(h.client.mutations(), vec!["buy".to_string(), "trigger".to_string()]);
        let targets: Vec<_> = h
            .client
            .recorded()
            .into_iter()
            .filter(|call| call.request.field() == "buy")
            .map(|call| call.target)
            .collect();
        assert_eq!(targets, vec![Some(AppTarget::User(user()))]);
        assert_eq!(mutations.status(), MutationStatus::default());
    }

    #[tokio::test]
    async fn invalid_auction_is_rejected_before_the_network() {
        let h = Harness::new();
        script_mutations(&h);
        let app = connected(&h);
        let (errors, on_error) = counter();
        let callbacks = MutationCallbacks {
            on_success: None,
            on_error: Some(on_error),
        };
        let mutations = use_auction_mutations(&app, callbacks);

        let params = NewAuction {
            floor_price: "200".to_string(),
            ..new_auction()
        };
        assert!(!mutations.create_auction(&params).await);

        assert!(h.client.recorded().is_empty());
        assert!(matches!(mutations.status().error, Some(SyncError::InvalidInput(_))));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_refreshes_the_lists() {
        let h = Harness::new();
        script_mutations(&h);
        h.client
            .respond("allAuctions", json!([auction_json(1, "Active")]));
        let _ = h.store.fetch_active_auctions(0, 10, FetchMode::IfStale).await;
        let app = connected(&h);
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());

        assert!(mutations.create_auction(&new_auction()).await);

        assert!(h.store.is_stale(&CacheKey::ActiveAuctions { offset: 0, limit: 10 }));
        assert!(h.store.is_stale(&CacheKey::AllAuctions));
        let targets: Vec<_> = h
            .client
            .recorded()
            .into_iter()
            .filter(|call| call.request.field() == "createAuction")
            .map(|call| call.target)
            .collect();
        assert_eq!(targets, vec![Some(AppTarget::Authority)]);
    }

    #[tokio::test]
    async fn preconditions_fail_fast() {
        let h = Harness::new();
        script_mutations(&h);
        let app = AppState::with_store(h.store.clone(), &SyncConfig::default());
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());

        assert!(!mutations.buy(A42, 1).await);
        assert_eq!(mutations.status().error, Some(SyncError::WalletNotConnected));

        app.set_wallet(WalletSession::connected(user(), None));
        assert!(!mutations.buy(A42, 0).await);
        assert!(matches!(mutations.status().error, Some(SyncError::InvalidInput(_))));

        app.set_wallet(WalletSession {
            syncing: true,
            ..WalletSession::connected(user(), None)
        });
        assert!(!mutations.claim_settlement(A42).await);
        assert_eq!(mutations.status().error, Some(SyncError::WalletSyncing));

        assert!(h.client.recorded().is_empty());
    }

    #[tokio::test]
    async fn remote_errors_are_recorded_and_cache_is_untouched() {
        let h = Harness::new();
        h.client.respond("auctionInfo", auction_json(42, "Active"));
        h.client.respond_raw(
            "buy",
            r#"{"data": null, "errors": [{"message": "auction closed"}]}"#,
        );
        let _ = h.store.fetch_auction_summary(A42, FetchMode::IfStale).await;
        let app = connected(&h);
        let successes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&successes);
        let callbacks = MutationCallbacks {
            on_success: Some(Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })),
            on_error: None,
        };
        let mutations = use_auction_mutations(&app, callbacks);

        assert!(!mutations.buy(A42, 1).await);
        assert_eq!(
            mutations.status().error,
            Some(SyncError::Remote(vec!["auction closed".to_string()]))
        );
        assert_eq!(successes.load(Ordering::SeqCst), 0);
        assert!(h.store.auction(A42).is_some_and(|e| e.timestamp == T0));
        assert_eq!(h.client.mutations(), vec!["buy".to_string()]);
    }

    #[tokio::test]
    async fn null_payload_is_an_error() {
        let h = Harness::new();
        h.client.respond("claimSettlement", serde_json::Value::Null);
        let app = connected(&h);
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());

        assert!(!mutations.claim_settlement(A42).await);
        assert!(matches!(mutations.status().error, Some(SyncError::NullPayload(_))));
    }

    #[tokio::test]
    async fn failed_trigger_still_invalidates() {
        let h = Harness::new();
        script_mutations(&h);
        h.client
            .fail("trigger", SyncError::Transport("down".to_string()));
        h.client.respond("auctionInfo", auction_json(42, "Active"));
        let _ = h.store.fetch_auction_summary(A42, FetchMode::IfStale).await;
        let app = connected(&h);
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());

        assert!(mutations.buy(A42, 1).await);
        assert!(h.store.is_stale(&CacheKey::AuctionSummary(A42)));
    }

    #[tokio::test]
    async fn claim_refreshes_settled_list() {
        let h = Harness::new();
        script_mutations(&h);
        h.client
            .respond("allAuctions", json!([auction_json(42, "Settled")]));
        let _ = h.store.fetch_settled_auctions(0, 10, FetchMode::IfStale).await;
        let app = connected(&h);
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());

        assert!(mutations.claim_settlement(A42).await);
        assert!(h.store.is_stale(&CacheKey::SettledAuctions { offset: 0, limit: 10 }));
        assert!(h.store.is_stale(&CacheKey::AuctionSummary(A42)));
    }

    #[tokio::test]
    async fn subscription_targets_the_user_chain() {
        let h = Harness::new();
        script_mutations(&h);
        h.client.respond("unsubscribeFromAuction", json!("ok"));
        let app = connected(&h);
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());

        assert!(mutations.subscribe_to_auction().await);
        assert!(mutations.unsubscribe_from_auction().await);

        let calls = h.client.recorded();
        let Some(subscribe) = calls.iter().find(|c| c.request.field() == "subscribeToAuction")
        else {
            panic!("subscribe not sent");
        };
        assert_eq!(subscribe.target, Some(AppTarget::User(user())));
        assert_eq!(
            subscribe.request.argument("aacChain"),
            Some(&crate::client::ArgValue::Str("aac".to_string()))
        );
        assert_eq!(h.client.mutations().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn flag_is_set_while_in_flight() {
        let h = Harness::new();
        script_mutations(&h);
        h.client.delay("buy", Duration::from_millis(50));
        let app = connected(&h);
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());

        let mut buying = task::spawn(mutations.buy(A42, 1));
        assert_pending!(buying.poll());
        assert!(mutations.status().is_buying);
        assert!(!mutations.status().is_claiming);

        assert!(buying.await);
        assert!(!mutations.status().is_buying);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_subscribe_and_unsubscribe_keep_their_own_flags() {
        let h = Harness::new();
        script_mutations(&h);
        h.client.respond("unsubscribeFromAuction", json!("ok"));
        h.client.delay("subscribeToAuction", Duration::from_millis(50));
        h.client.delay("unsubscribeFromAuction", Duration::from_millis(10));
        let app = connected(&h);
        let mutations = use_auction_mutations(&app, MutationCallbacks::default());

        let mut subscribing = task::spawn(mutations.subscribe_to_auction());
        let mut unsubscribing = task::spawn(mutations.unsubscribe_from_auction());
        assert_pending!(subscribing.poll());
        assert_pending!(unsubscribing.poll());
        let status = mutations.status();
        assert!(status.is_subscribing && status.is_unsubscribing);

        assert!(unsubscribing.await);
        let status = mutations.status();
        assert!(status.is_subscribing);
        assert!(!status.is_unsubscribing);

        assert!(subscribing.await);
        assert!(!mutations.status().is_subscribing);
    }
}

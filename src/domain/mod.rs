//! Domain layer: identifiers, auction records, cache entries, events.
//!
//! This module holds the normalized representation the store caches
//! (everything in milliseconds), the cache entry state machine, the event
//! bus used to notify query handles, and the wallet and indexer state the
//! store consults.

pub mod amount;
pub mod auction;
pub mod bid;
pub mod cache_entry;
pub mod clock;
pub mod event_bus;
pub mod ids;
pub mod indexer;
pub mod store_event;
pub mod wallet;

pub use auction::{Auction, AuctionStatus, NewAuction};
pub use bid::{AuctionCommitment, BidRecord, SettlementResult, UserCommitment};
pub use cache_entry::{CacheEntry, CacheKey, CacheStatus, ListCacheEntry, STALE_TIMESTAMP};
pub use clock::{Clock, ManualClock, SystemClock};
pub use event_bus::EventBus;
pub use ids::{AuctionId, ChainId, Owner};
pub use indexer::{IndexerState, IndexerStatus, SubscriptionInfo};
pub use store_event::{ChangeKind, StoreEvent};
pub use wallet::WalletSession;

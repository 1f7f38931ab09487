//! # auction-sync
//!
//! Client-side synchronization layer for a descending-price auction
//! application: a normalized cache of auctions, bids and user commitments,
//! kept fresh by deduplicated fetches and shared polling timers.
//!
//! The store is the single source of truth. Query handles read it and
//! trigger fetches when the cache has nothing fresh; mutation handles run
//! remote mutations and invalidate exactly the entries they affect.
//!
//! ## Architecture
//!
//! ```text
//! Views
//!     │
//!     ├── Query handles / AuctionMutations (hooks/)
//!     ├── PollingManager (sync/)
//!     │
//!     ├── AuctionStore (store/) ── EventBus (domain/)
//!     ├── QueryDeduplicator (sync/)
//!     │
//!     ├── ApplicationClient (client/) ── node service
//!     └── BootstrapRecordStore (persistence/)
//! ```

pub mod app_state;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod persistence;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

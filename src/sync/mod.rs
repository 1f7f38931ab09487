//! Request coordination: in-flight deduplication and shared polling.

pub mod dedup;
pub mod polling;

pub use dedup::QueryDeduplicator;
pub use polling::{PollCallback, PollSubscription, PollingManager};

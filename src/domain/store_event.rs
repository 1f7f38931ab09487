//! Change notifications emitted by the store.
//!
//! Every cache write publishes a [`StoreEvent`] through the
//! [`super::EventBus`]. Query handles wait on these to know when their
//! derived state has to be recomputed.

use super::CacheKey;

/// What happened to a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A fetch started; the entry is now loading.
    Loading,
    /// A fetch succeeded and new data was written.
    Updated,
    /// A fetch failed; the error was recorded.
    Failed,
    /// The entry was marked stale.
    Invalidated,
    /// The entry (or the whole store) was cleared.
    Cleared,
}

/// Notification that a cache entry changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Entry that changed; `None` means every entry.
    pub key: Option<CacheKey>,
    /// Kind of change.
    pub kind: ChangeKind,
}

impl StoreEvent {
    /// Event scoped to one entry.
    #[must_use]
    pub const fn new(key: CacheKey, kind: ChangeKind) -> Self {
        Self {
            key: Some(key),
            kind,
        }
    }

    /// Event that concerns every entry.
    #[must_use]
    pub const fn everything(kind: ChangeKind) -> Self {
        Self { key: None, kind }
    }

    /// Returns `true` if a handle watching `key` should recompute its state.
    ///
    /// List handles also react to auction updates: their rows are resolved
    /// from the shared auction cache.
    #[must_use]
    pub fn concerns(&self, key: &CacheKey) -> bool {
        match &self.key {
            None => true,
            Some(changed) if changed == key => true,
            Some(CacheKey::AuctionSummary(_) | CacheKey::AllAuctions) => key.is_auction_list(),
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuctionId;

    #[test]
    fn exact_key_matches() {
        let key = CacheKey::AuctionSummary(AuctionId::new(1));
        let event = StoreEvent::new(key.clone(), ChangeKind::Updated);
        assert!(event.concerns(&key));
        assert!(!event.concerns(&CacheKey::AuctionSummary(AuctionId::new(2))));
    }

    #[test]
    fn auction_updates_reach_list_watchers() {
        let event = StoreEvent::new(CacheKey::AuctionSummary(AuctionId::new(1)), ChangeKind::Updated);
        assert!(event.concerns(&CacheKey::ActiveAuctions { offset: 0, limit: 10 }));
        assert!(!event.concerns(&CacheKey::Indexer));
    }

    #[test]
    fn global_event_concerns_everyone() {
        let event = StoreEvent::everything(ChangeKind::Invalidated);
        assert!(event.concerns(&CacheKey::Indexer));
    }
}

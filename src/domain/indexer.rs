//! Indexer bootstrap state.
//!
//! The indexer is an optional remote aggregation application. Before it
//! can stream auction events it must be initialized once per chain; this
//! module tracks what the client knows about that initialization.

use serde::{Deserialize, Serialize};

use super::ChainId;

/// How far the indexer bootstrap has progressed, as seen locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerStatus {
    /// Nothing attempted, or reset.
    #[default]
    Uninitialized,
    /// A bootstrap attempt is in flight.
    Initializing,
    /// The remote subscription state confirms the indexer is initialized.
    Verified,
    /// The initialization call succeeded but could not be confirmed by a
    /// follow-up read; assumed initialized.
    Optimistic,
    /// The initialization call itself failed.
    Failed,
}

impl IndexerStatus {
    /// Returns `true` for both confirmed and assumed initialization.
    #[must_use]
    pub const fn is_initialized(self) -> bool {
        matches!(self, Self::Verified | Self::Optimistic)
    }
}

/// Remote subscription information as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Auction authority chain the indexer listens to.
    pub aac_chain: ChainId,
    /// Auction application the indexer listens to.
    pub auction_app: String,
    /// Whether the indexer finished its own initialization.
    pub initialized: bool,
}

/// Local view of the indexer bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerState {
    /// Auction authority chain, once known.
    pub aac_chain: Option<ChainId>,
    /// Auction application, once known.
    pub auction_app: Option<String>,
    /// Bootstrap progress.
    pub status: IndexerStatus,
}

impl IndexerState {
    /// Returns `true` when the indexer is verified or assumed initialized.
    #[must_use]
    pub const fn initialized(&self) -> bool {
        self.status.is_initialized()
    }

    /// Adopts the remote subscription info with the given status.
    #[must_use]
    pub fn from_info(info: &SubscriptionInfo, status: IndexerStatus) -> Self {
        Self {
            aac_chain: Some(info.aac_chain.clone()),
            auction_app: Some(info.auction_app.clone()),
            status,
        }
    }
}

//! Persisted record shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChainId, IndexerState, IndexerStatus};

/// Local record that the indexer was bootstrapped for a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapRecord {
    /// Auction authority chain the indexer was bootstrapped for.
    pub aac_chain: ChainId,
    /// Auction application the indexer listens to, if reported.
    pub auction_app: Option<String>,
    /// How the bootstrap was confirmed.
    pub status: IndexerStatus,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
}

impl BootstrapRecord {
    /// Builds a record from the current indexer state, or `None` if the
    /// state is not initialized or has no chain.
    #[must_use]
    pub fn from_state(state: &IndexerState, recorded_at: DateTime<Utc>) -> Option<Self> {
        if !state.initialized() {
            return None;
        }
        Some(Self {
            aac_chain: state.aac_chain.clone()?,
            auction_app: state.auction_app.clone(),
            status: state.status,
            recorded_at,
        })
    }

    /// Local indexer state this record describes.
    #[must_use]
    pub fn to_state(&self) -> IndexerState {
        IndexerState {
            aac_chain: Some(self.aac_chain.clone()),
            auction_app: self.auction_app.clone(),
            status: self.status,
        }
    }
}

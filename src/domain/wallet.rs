//! Wallet session as seen by the synchronization layer.
//!
//! Connecting a wallet is somebody else's job; this layer only needs to
//! know which user chain is active and whether it is still syncing.

use super::{ChainId, Owner};
use crate::error::SyncError;

/// Snapshot of the connected wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSession {
    /// User chain (UIC) of the connected wallet.
    pub chain_id: Option<ChainId>,
    /// Account owner of the connected wallet.
    pub owner: Option<Owner>,
    /// `true` while the wallet is catching up with its chain.
    pub syncing: bool,
}

impl WalletSession {
    /// Session for a connected, synced wallet.
    #[must_use]
    pub fn connected(chain_id: ChainId, owner: Option<Owner>) -> Self {
        Self {
            chain_id: Some(chain_id),
            owner,
            syncing: false,
        }
    }

    /// Returns `true` if a wallet chain is set.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.chain_id.is_some()
    }

    /// Returns the user chain if the wallet is connected and not syncing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WalletNotConnected`] or
    /// [`SyncError::WalletSyncing`].
    pub fn ready_chain(&self) -> Result<&ChainId, SyncError> {
        let chain = self.chain_id.as_ref().ok_or(SyncError::WalletNotConnected)?;
        if self.syncing {
            return Err(SyncError::WalletSyncing);
        }
        Ok(chain)
    }
}

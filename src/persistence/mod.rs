//! Persistence layer: the local indexer bootstrap record.
//!
//! Provides the [`BootstrapRecordStore`] trait for the one piece of state
//! that outlives the process: whether the indexer was already bootstrapped
//! for a chain. Implementations keep it in memory or in a JSON file.

pub mod file;
pub mod memory;
pub mod models;

use std::fmt;

use async_trait::async_trait;

use crate::error::SyncError;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
pub use models::BootstrapRecord;

/// Storage for the bootstrap record.
#[async_trait]
pub trait BootstrapRecordStore: Send + Sync + fmt::Debug {
    /// Loads the record, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Persistence`] if the record cannot be read.
    async fn load(&self) -> Result<Option<BootstrapRecord>, SyncError>;

    /// Saves the record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Persistence`] if the record cannot be written.
    async fn save(&self, record: &BootstrapRecord) -> Result<(), SyncError>;

    /// Removes the record. Clearing an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Persistence`] if the record cannot be removed.
    async fn clear(&self) -> Result<(), SyncError>;
}

//! In-memory bootstrap record store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BootstrapRecord, BootstrapRecordStore};
use crate::error::SyncError;

/// Keeps the record for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    record: RwLock<Option<BootstrapRecord>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BootstrapRecordStore for MemoryRecordStore {
    async fn load(&self) -> Result<Option<BootstrapRecord>, SyncError> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, record: &BootstrapRecord) -> Result<(), SyncError> {
        *self.record.write().await = Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SyncError> {
        *self.record.write().await = None;
        Ok(())
    }
}

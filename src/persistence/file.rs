//! JSON-file bootstrap record store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{BootstrapRecord, BootstrapRecordStore};
use crate::error::SyncError;

/// Stores the record as a JSON document at a fixed path.
///
/// Writes go to a sibling temporary file first and are renamed into
/// place, so a crash never leaves a half-written record.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    /// Creates a store backed by `path`. Nothing is touched until used.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn persistence_error(path: &Path, e: impl std::fmt::Display) -> SyncError {
    SyncError::Persistence(format!("{}: {e}", path.display()))
}

#[async_trait]
impl BootstrapRecordStore for FileRecordStore {
    async fn load(&self) -> Result<Option<BootstrapRecord>, SyncError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(persistence_error(&self.path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| persistence_error(&self.path, e))
    }

    async fn save(&self, record: &BootstrapRecord) -> Result<(), SyncError> {
        let raw =
            serde_json::to_vec_pretty(record).map_err(|e| persistence_error(&self.path, e))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_error(parent, e))?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, raw)
            .await
            .map_err(|e| persistence_error(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| persistence_error(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "bootstrap record saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SyncError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence_error(&self.path, e)),
        }
    }
}

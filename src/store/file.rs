//! Local JSON-document store
//!
//! The table is a single JSON array of items. It is loaded into a
//! [`MemoryStore`] on open and rewritten after every successful write
//! (temp file, then rename).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{BatchWriteOutcome, MemoryStore, PersonStore, ScanPage, ScanRequest};
use crate::error::StoreError;
use crate::model::{Item, Subscriber};

pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open the table at `path`; a missing file is an empty table
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let items: Vec<Item> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), items = items.len(), "Opened table");
        Ok(Self {
            path,
            inner: MemoryStore::from_items(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory view backing this table
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Write the current table back to disk
    pub async fn persist(&self) -> Result<(), StoreError> {
        let items = self.inner.snapshot().await;
        let json = serde_json::to_vec_pretty(&items)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), items = items.len(), "Persisted table");
        Ok(())
    }
}

#[async_trait]
impl PersonStore for JsonFileStore {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        self.inner.scan(request).await
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        self.inner.put_item(item).await?;
        self.persist().await
    }

    async fn batch_write(&self, items: Vec<Item>) -> Result<BatchWriteOutcome, StoreError> {
        let outcome = self.inner.batch_write(items).await?;
        self.persist().await?;
        Ok(outcome)
    }

    async fn opted_in_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        self.inner.opted_in_subscribers().await
    }
}

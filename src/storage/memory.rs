//! In-process storage, used by tests and short-lived embeddings.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

use super::clock::{self, Clock, SystemClock};
use super::{Area, FileId, Storage, StoredFile, SweepReport};
use crate::config::RetentionPolicy;
use crate::error::{PdfCraftError, Result};

#[derive(Debug, Clone)]
struct Entry {
    bytes: Arc<Vec<u8>>,
    created_at: SystemTime,
}

/// Storage kept entirely in memory.
#[derive(Debug)]
pub struct MemoryStorage {
    files: RwLock<HashMap<(Area, FileId), Entry>>,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl MemoryStorage {
    /// Create empty storage using the system clock.
    pub fn new(retention: RetentionPolicy) -> Self {
        Self::with_clock(retention, Arc::new(SystemClock))
    }

    /// Create empty storage reading time from `clock`.
    pub fn with_clock(retention: RetentionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            retention,
            clock,
        }
    }

    /// Number of files held in an area, expired or not.
    pub async fn len(&self, area: Area) -> usize {
        self.files
            .read()
            .await
            .keys()
            .filter(|(a, _)| *a == area)
            .count()
    }

    /// Check whether both areas are empty.
    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    async fn insert(&self, area: Area, id: FileId, bytes: &[u8]) -> SystemTime {
        let created_at = self.clock.now();
        let entry = Entry {
            bytes: Arc::new(bytes.to_vec()),
            created_at,
        };
        self.files.write().await.insert((area, id), entry);
        created_at
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn stage(&self, bytes: &[u8], name: &str) -> Result<FileId> {
        let id = FileId::generate(&crate::utils::extension_of(name));
        self.insert(Area::Staging, id.clone(), bytes).await;
        Ok(id)
    }

    async fn fetch(&self, area: Area, id: &FileId) -> Result<Vec<u8>> {
        let files = self.files.read().await;
        let entry = files
            .get(&(area, id.clone()))
            .ok_or_else(|| PdfCraftError::not_found(id))?;

        if self
            .retention
            .is_expired(clock::age(self.clock.now(), entry.created_at))
        {
            return Err(PdfCraftError::not_found(id));
        }

        Ok(entry.bytes.as_ref().clone())
    }

    async fn store_result(&self, bytes: &[u8], extension: &str) -> Result<StoredFile> {
        let id = FileId::generate(extension);
        let created_at = self.insert(Area::Results, id.clone(), bytes).await;
        Ok(StoredFile {
            id,
            created_at,
            size: bytes.len() as u64,
        })
    }

    async fn delete(&self, area: Area, id: &FileId) -> Result<()> {
        self.files.write().await.remove(&(area, id.clone()));
        Ok(())
    }

    async fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let mut files = self.files.write().await;

        let examined = files.len();
        files.retain(|_, entry| !self.retention.is_expired(clock::age(now, entry.created_at)));

        Ok(SweepReport {
            examined,
            removed: examined - files.len(),
            failed: 0,
        })
    }

    fn retention(&self) -> RetentionPolicy {
        self.retention
    }
}

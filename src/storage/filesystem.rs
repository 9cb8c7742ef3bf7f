//! Directory-backed storage.
//!
//! Each area is a flat directory of `<uuid>.<ext>` files. A file's creation
//! time is its modification time; files are never modified after the
//! rename that publishes them.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::clock::{self, Clock, SystemClock};
use super::{Area, FileId, Storage, StoredFile, SweepReport};
use crate::config::{RetentionPolicy, StorageConfig};
use crate::error::{PdfCraftError, Result};

/// Storage backed by two local directories.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    staging_dir: PathBuf,
    results_dir: PathBuf,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl FilesystemStorage {
    /// Open storage at the configured directories, creating them if needed.
    ///
    /// # Errors
    ///
    /// Returns an IoFailure if a directory cannot be created.
    pub async fn open(config: &StorageConfig, retention: RetentionPolicy) -> Result<Self> {
        Self::open_with_clock(config, retention, Arc::new(SystemClock)).await
    }

    /// Like [`open`](Self::open), reading time from `clock`.
    pub async fn open_with_clock(
        config: &StorageConfig,
        retention: RetentionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        for dir in [&config.staging_dir, &config.results_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                PdfCraftError::io_failure(format!("creating {}", dir.display()), e)
            })?;
        }

        Ok(Self {
            staging_dir: config.staging_dir.clone(),
            results_dir: config.results_dir.clone(),
            retention,
            clock,
        })
    }

    /// Directory holding an area.
    pub fn dir(&self, area: Area) -> &Path {
        match area {
            Area::Staging => &self.staging_dir,
            Area::Results => &self.results_dir,
        }
    }

    fn path_of(&self, area: Area, id: &FileId) -> PathBuf {
        self.dir(area).join(id.as_str())
    }

    /// Write `bytes` under a temporary name, then rename into place.
    async fn write_atomic(&self, area: Area, id: &FileId, bytes: &[u8]) -> Result<()> {
        let final_path = self.path_of(area, id);
        let temp_path = self.dir(area).join(format!(".{id}.tmp"));

        if let Err(e) = tokio::fs::write(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(PdfCraftError::io_failure(format!("writing {area} file"), e));
        }

        tokio::fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| PdfCraftError::io_failure(format!("publishing {area} file"), e))?;

        debug!(area = %area, id = %id, size = bytes.len(), "Stored file");
        Ok(())
    }
}

#[async_trait]
impl Storage for FilesystemStorage {
    async fn stage(&self, bytes: &[u8], name: &str) -> Result<FileId> {
        let id = FileId::generate(&crate::utils::extension_of(name));
        self.write_atomic(Area::Staging, &id, bytes).await?;
        Ok(id)
    }

    async fn fetch(&self, area: Area, id: &FileId) -> Result<Vec<u8>> {
        let path = self.path_of(area, id);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PdfCraftError::not_found(id));
            }
            Err(e) => return Err(PdfCraftError::io_failure(format!("inspecting {area} file"), e)),
        };

        let modified = metadata
            .modified()
            .map_err(|e| PdfCraftError::io_failure("reading modification time", e))?;
        if self
            .retention
            .is_expired(clock::age(self.clock.now(), modified))
        {
            debug!(area = %area, id = %id, "Refusing to serve expired file");
            return Err(PdfCraftError::not_found(id));
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PdfCraftError::not_found(id)),
            Err(e) => Err(PdfCraftError::io_failure(format!("reading {area} file"), e)),
        }
    }

    async fn store_result(&self, bytes: &[u8], extension: &str) -> Result<StoredFile> {
        let id = FileId::generate(extension);
        self.write_atomic(Area::Results, &id, bytes).await?;

        let created_at = tokio::fs::metadata(self.path_of(Area::Results, &id))
            .await
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| self.clock.now());

        Ok(StoredFile {
            id,
            created_at,
            size: bytes.len() as u64,
        })
    }

    async fn delete(&self, area: Area, id: &FileId) -> Result<()> {
        match tokio::fs::remove_file(self.path_of(area, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PdfCraftError::io_failure(format!("deleting {area} file"), e)),
        }
    }

    async fn sweep(&self) -> Result<SweepReport> {
        let dirs: Vec<(Area, PathBuf)> = Area::ALL
            .iter()
            .map(|&area| (area, self.dir(area).to_path_buf()))
            .collect();
        let now = self.clock.now();
        let retention = self.retention;

        tokio::task::spawn_blocking(move || {
            let mut report = SweepReport::default();
            for (area, dir) in dirs {
                report.merge(sweep_dir(area, &dir, now, retention));
            }
            report
        })
        .await
        .map_err(|e| PdfCraftError::internal("sweeping storage", e))
    }

    fn retention(&self) -> RetentionPolicy {
        self.retention
    }
}

/// Delete expired files directly inside `dir`.
fn sweep_dir(area: Area, dir: &Path, now: SystemTime, retention: RetentionPolicy) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(area = %area, "Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file());

    for entry in entries {
        report.examined += 1;

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            _ => {
                // Vanished between listing and stat, or no mtime support.
                continue;
            }
        };

        if !retention.is_expired(clock::age(now, modified)) {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!(area = %area, file = %entry.path().display(), "Removed expired file");
                report.removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    area = %area,
                    file = %entry.path().display(),
                    "Failed to remove expired file: {e}"
                );
                report.failed += 1;
            }
        }
    }

    report
}

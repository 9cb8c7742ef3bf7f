//! Ephemeral file storage.
//!
//! Two areas hold files under generated identifiers:
//!
//! - **Staging** keeps uploads while the request that sent them is running.
//! - **Results** keeps transformation outputs until they expire.
//!
//! Both areas share one [`RetentionPolicy`]. A file older than the window
//! is gone as far as callers are concerned, whether or not the sweeper has
//! physically removed it yet.

pub mod clock;
pub mod filesystem;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use uuid::Uuid;

use crate::config::RetentionPolicy;
use crate::error::{PdfCraftError, Result};

pub use clock::{Clock, ManualClock, SystemClock};
pub use filesystem::FilesystemStorage;
pub use memory::MemoryStorage;

/// Longest accepted identifier extension.
const MAX_EXTENSION_LEN: usize = 8;

/// One of the two storage areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    /// Uploads awaiting transformation.
    Staging,
    /// Transformation outputs.
    Results,
}

impl Area {
    /// Both areas, in sweep order.
    pub const ALL: [Area; 2] = [Area::Staging, Area::Results];

    /// Lowercase name, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Results => "results",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a stored file: `<uuid-v4>.<ext>`.
///
/// Parsing is strict (hyphenated lowercase UUID, short alphanumeric
/// extension), so a parsed identifier is always a plain file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct FileId(String);

impl FileId {
    /// Allocate a fresh identifier with the given extension.
    ///
    /// The extension is sanitised; anything unusable becomes `bin`.
    pub fn generate(extension: &str) -> Self {
        let ext = crate::utils::sanitize_extension(extension);
        Self(format!("{}.{}", Uuid::new_v4().hyphenated(), ext))
    }

    /// The identifier as a file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The extension part, without the dot.
    pub fn extension(&self) -> &str {
        self.0.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
    }
}

impl FromStr for FileId {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PdfCraftError::not_found(s);

        let (stem, ext) = s.split_once('.').ok_or_else(invalid)?;
        let uuid = Uuid::parse_str(stem).map_err(|_| invalid())?;
        if uuid.hyphenated().to_string() != stem {
            return Err(invalid());
        }

        let ext_ok = !ext.is_empty()
            && ext.len() <= MAX_EXTENSION_LEN
            && ext.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        if !ext_ok {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

/// Metadata of a file written to the results area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Identifier to fetch it by.
    pub id: FileId,
    /// When it was written.
    pub created_at: SystemTime,
    /// Size in bytes.
    pub size: u64,
}

/// A file as received from a client, before staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// An upload that has been written to the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: FileId,
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn staged(upload: Upload, id: FileId) -> Self {
        Self {
            id,
            name: upload.name,
            bytes: upload.bytes,
        }
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Files looked at.
    pub examined: usize,
    /// Expired files deleted.
    pub removed: usize,
    /// Expired files that could not be deleted.
    pub failed: usize,
}

impl SweepReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: SweepReport) {
        self.examined += other.examined;
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

/// Backend holding the staging and results areas.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save an upload in the staging area.
    ///
    /// The extension of `name` is kept on the identifier.
    async fn stage(&self, bytes: &[u8], name: &str) -> Result<FileId>;

    /// Read a live file.
    ///
    /// Returns [`PdfCraftError::NotFound`] if the file does not exist or
    /// has outlived the retention window.
    async fn fetch(&self, area: Area, id: &FileId) -> Result<Vec<u8>>;

    /// Save a transformation output in the results area.
    async fn store_result(&self, bytes: &[u8], extension: &str) -> Result<StoredFile>;

    /// Remove a file. Removing a missing file succeeds.
    async fn delete(&self, area: Area, id: &FileId) -> Result<()>;

    /// Delete every expired file in both areas.
    async fn sweep(&self) -> Result<SweepReport>;

    /// The retention policy applied to both areas.
    fn retention(&self) -> RetentionPolicy;
}

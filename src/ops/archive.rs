//! ZIP archives for multi-file results.

use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::error::{PdfCraftError, Result};

/// Builds a deflated ZIP archive in memory.
pub struct ArchiveBuilder {
    zip: zip::ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl ArchiveBuilder {
    /// Start an empty archive.
    pub fn new() -> Self {
        Self {
            zip: zip::ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            entries: 0,
        }
    }

    /// Add a file.
    ///
    /// # Errors
    ///
    /// Returns an IoFailure if the entry cannot be written.
    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.zip
            .start_file(name, self.options)
            .map_err(|e| PdfCraftError::internal("creating ZIP entry", e))?;
        self.zip
            .write_all(bytes)
            .map_err(|e| PdfCraftError::io_failure("writing ZIP entry", e))?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Check whether no entries were added.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Finish the archive and return its bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self
            .zip
            .finish()
            .map_err(|e| PdfCraftError::internal("finalizing ZIP", e))?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! PDF serialisation to bytes.

use lopdf::Document;

use crate::error::{PdfCraftError, Result};

/// Options for writing PDF documents.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Flate-compress uncompressed streams before writing.
    pub compress: bool,

    /// Drop unreferenced objects and renumber the rest.
    pub optimize: bool,
}

impl WriteOptions {
    /// Write the document exactly as it is.
    pub fn verbatim() -> Self {
        Self {
            compress: false,
            optimize: false,
        }
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compress: true,
            optimize: true,
        }
    }
}

/// Serialises documents with configurable clean-up.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    options: WriteOptions,
}

impl PdfWriter {
    /// Create a writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with custom options.
    pub fn with_options(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Serialise `doc`, applying the configured clean-up first.
    ///
    /// # Errors
    ///
    /// Returns an IoFailure if `lopdf` cannot serialise the document.
    pub fn write(&self, doc: &mut Document) -> Result<Vec<u8>> {
        if self.options.optimize {
            doc.prune_objects();
            doc.renumber_objects();
        }

        if self.options.compress {
            doc.compress();
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| PdfCraftError::internal("serialising PDF", e))?;
        Ok(bytes)
    }
}

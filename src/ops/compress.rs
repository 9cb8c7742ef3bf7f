//! Lossless size reduction.

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::io::{LoadedPdf, PdfWriter};

/// Sizes before and after compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionStats {
    pub original_size: u64,
    pub compressed_size: u64,
}

impl CompressionStats {
    /// Relative saving in percent, rounded to one decimal place.
    ///
    /// Negative when the output grew. Zero for an empty original.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let ratio = self.compressed_size as f64 / self.original_size as f64;
        ((1.0 - ratio) * 1000.0).round() / 10.0
    }
}

/// Drop empty streams and unreferenced objects, then flate-compress the rest.
pub fn compress(pdf: &mut LoadedPdf, original_size: u64) -> Result<(Vec<u8>, CompressionStats)> {
    let removed = pdf.document.delete_zero_length_streams();
    debug!(name = %pdf.name, empty_streams = removed.len(), "Removed empty streams");

    let bytes = PdfWriter::new().write(&mut pdf.document)?;
    let stats = CompressionStats {
        original_size,
        compressed_size: bytes.len() as u64,
    };
    debug!(
        name = %pdf.name,
        original = stats.original_size,
        compressed = stats.compressed_size,
        reduction = stats.reduction_percent(),
        "Compressed document"
    );
    Ok((bytes, stats))
}

//! PDF rasterisation via pdfium.
//!
//! The pdfium library is bound at call time. A host without it can still run
//! every other operation; only `pdf-to-jpg` reports an IOFailure.

use std::io::Cursor;
use std::sync::OnceLock;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

use super::archive::ArchiveBuilder;
use super::params::RasterFormat;
use crate::error::{PdfCraftError, Result};

/// Default rendering resolution.
pub const DEFAULT_DPI: u32 = 150;

/// Accepted resolution range.
pub const DPI_RANGE: std::ops::RangeInclusive<u32> = 36..=600;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 85;

/// Rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub dpi: u32,
    pub format: RasterFormat,
    pub quality: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            format: RasterFormat::default(),
            quality: DEFAULT_QUALITY,
        }
    }
}

impl RenderOptions {
    /// # Errors
    ///
    /// Returns a ValidationError for a resolution outside [`DPI_RANGE`] or a
    /// quality outside 1..=100.
    pub fn validate(&self) -> Result<()> {
        if !DPI_RANGE.contains(&self.dpi) {
            return Err(PdfCraftError::validation(format!(
                "DPI must be between {} and {}, got {}",
                DPI_RANGE.start(),
                DPI_RANGE.end(),
                self.dpi
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(PdfCraftError::validation(format!(
                "Quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

/// Load pdfium from the working directory, falling back to the system library.
fn bind_library() -> Result<Box<dyn PdfiumLibraryBindings>> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| PdfCraftError::internal("loading the pdfium library", format!("{e:?}")))
}

fn bind_pdfium() -> Result<Pdfium> {
    Ok(Pdfium::new(bind_library()?))
}

/// Whether the pdfium library can be loaded on this host.
///
/// Checked once per process. Only the library is loaded; pdfium itself is
/// not initialised.
pub fn renderer_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| match bind_library() {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "pdfium is unavailable; pdf-to-jpg will fail");
            false
        }
    })
}

fn classify_load_error(name: &str, err: &PdfiumError) -> PdfCraftError {
    let details = format!("{err:?}");
    if details.contains("Password") || details.contains("password") {
        PdfCraftError::invalid_password(format!("'{name}' is password protected; unlock it first"))
    } else {
        PdfCraftError::malformed(name, details)
    }
}

fn encode(image: &DynamicImage, options: &RenderOptions) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match options.format {
        RasterFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut bytes, options.quality);
            image
                .to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| PdfCraftError::internal("encoding JPEG", e))?;
        }
        RasterFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .map_err(|e| PdfCraftError::internal("encoding PNG", e))?;
        }
    }
    Ok(bytes)
}

/// Render every page of `bytes` and pack the images into a ZIP archive.
///
/// Entries are named `page_<n>.<ext>` with 1-based page numbers.
///
/// # Errors
///
/// Returns InvalidPassword for an encrypted document, MalformedInput if
/// pdfium cannot parse it and IOFailure if pdfium is unavailable.
pub fn render_pages(bytes: &[u8], name: &str, options: &RenderOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| classify_load_error(name, &e))?;

    let scale = options.dpi as f32 / 72.0;
    let config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let pages = document.pages();
    info!(name, pages = pages.len(), dpi = options.dpi, "Rendering document");

    let mut archive = ArchiveBuilder::new();
    for (index, page) in pages.iter().enumerate() {
        let number = index + 1;
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfCraftError::malformed(name, format!("page {number}: {e:?}")))?;
        let image = bitmap.as_image();
        debug!(page = number, width = image.width(), height = image.height(), "Rendered page");

        let encoded = encode(&image, options)?;
        archive.add(&format!("page_{number}.{}", options.format.extension()), &encoded)?;
    }

    archive.finish()
}

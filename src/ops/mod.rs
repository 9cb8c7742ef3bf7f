//! The transformations the service offers.
//!
//! [`Operation`] is the typed, validated form of a request. Each variant
//! maps onto one function in the submodules; [`Operation::apply`] does the
//! loading, calls it and serialises the result. Everything in here is
//! synchronous and CPU-bound and is expected to run on the blocking pool.

pub mod archive;
pub mod compress;
pub mod images;
pub mod inspect;
pub mod overlay;
pub mod pages;
pub mod params;
pub mod registry;
pub mod render;
pub mod security;

use lopdf::Document;
use serde::Serialize;
use tracing::debug;

use crate::error::{PdfCraftError, Result};
use crate::io::{LoadedPdf, PdfReader, PdfWriter};
use crate::storage::UploadedFile;

use archive::ArchiveBuilder;
pub use compress::CompressionStats;
use images::ImageLayout;
use overlay::{PageNumberOptions, WatermarkOptions};
use params::{PageSelection, Rotation, SplitMode};
pub use registry::{Engine, FileCount, InputKind, OperationRegistry, OperationSpec};
use render::RenderOptions;
use security::{ProtectOptions, UnlockOptions};

/// A transformation with its parameters already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Merge,
    Split(SplitMode),
    RemovePages(PageSelection),
    Extract(PageSelection),
    Compress,
    Rotate(Rotation),
    Watermark(WatermarkOptions),
    PageNumbers(PageNumberOptions),
    Protect(ProtectOptions),
    Unlock(UnlockOptions),
    ImagesToPdf(ImageLayout),
    PdfToImages(RenderOptions),
}

impl Operation {
    /// Canonical registry name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Split(_) => "split",
            Self::RemovePages(_) => "remove-pages",
            Self::Extract(_) => "extract",
            Self::Compress => "compress",
            Self::Rotate(_) => "rotate",
            Self::Watermark(_) => "watermark",
            Self::PageNumbers(_) => "page-numbers",
            Self::Protect(_) => "protect",
            Self::Unlock(_) => "unlock",
            Self::ImagesToPdf(_) => "images-to-pdf",
            Self::PdfToImages(_) => "pdf-to-jpg",
        }
    }

    /// Run the transformation over `inputs`, in order.
    ///
    /// File counts and types are expected to have been checked against the
    /// registry already; only the first input is read by single-file
    /// operations.
    ///
    /// # Errors
    ///
    /// Every failure is already classified: ValidationError for parameters
    /// that do not fit the document (such as an out-of-range page),
    /// MalformedInput or InvalidPassword for inputs the libraries reject,
    /// IOFailure for serialisation problems.
    pub fn apply(&self, inputs: &[UploadedFile]) -> Result<Output> {
        debug!(operation = self.name(), inputs = inputs.len(), "Applying operation");

        match self {
            Self::Merge => {
                let documents = inputs.iter().map(load).collect::<Result<Vec<_>>>()?;
                let mut merged = pages::merge(documents)?;
                Output::pdf(&mut merged, "merged.pdf")
            }
            Self::Split(SplitMode::All) => {
                let pdf = load(single(inputs)?)?;
                let writer = PdfWriter::new();
                let mut archive = ArchiveBuilder::new();
                for number in 1..=pdf.page_count() {
                    let mut page = pages::select(&pdf, &[number])?;
                    archive.add(&format!("page_{number}.pdf"), &writer.write(&mut page)?)?;
                }
                Ok(Output::zip(archive.finish()?, "split_pages.zip"))
            }
            Self::Split(SplitMode::Range(selection)) => {
                let pdf = load(single(inputs)?)?;
                Output::pdf(&mut pages::extract(&pdf, selection)?, "split.pdf")
            }
            Self::RemovePages(selection) => {
                let pdf = load(single(inputs)?)?;
                Output::pdf(&mut pages::remove(&pdf, selection)?, "removed_pages.pdf")
            }
            Self::Extract(selection) => {
                let pdf = load(single(inputs)?)?;
                Output::pdf(&mut pages::extract(&pdf, selection)?, "extracted.pdf")
            }
            Self::Compress => {
                let input = single(inputs)?;
                let mut pdf = load(input)?;
                let (bytes, stats) = compress::compress(&mut pdf, input.bytes.len() as u64)?;
                Ok(Output {
                    compression: Some(stats),
                    ..Output::new(bytes, OutputFormat::Pdf, "compressed.pdf")
                })
            }
            Self::Rotate(rotation) => {
                let mut pdf = load(single(inputs)?)?;
                pages::rotate(&mut pdf, *rotation)?;
                Output::pdf(&mut pdf.document, "rotated.pdf")
            }
            Self::Watermark(options) => {
                let mut pdf = load(single(inputs)?)?;
                overlay::watermark(&mut pdf, options)?;
                Output::pdf(&mut pdf.document, "watermarked.pdf")
            }
            Self::PageNumbers(options) => {
                let mut pdf = load(single(inputs)?)?;
                overlay::number_pages(&mut pdf, options)?;
                Output::pdf(&mut pdf.document, "page_numbers.pdf")
            }
            Self::Protect(options) => {
                let pdf = load(single(inputs)?)?;
                let bytes = security::protect(pdf, options)?;
                Ok(Output::new(bytes, OutputFormat::Pdf, "protected.pdf"))
            }
            Self::Unlock(options) => {
                let input = single(inputs)?;
                let mut pdf = security::unlock(&input.bytes, &input.name, options)?;
                Output::pdf(&mut pdf.document, "unlocked.pdf")
            }
            Self::ImagesToPdf(layout) => {
                let images = inputs.iter().map(|f| (f.name.as_str(), f.bytes.as_slice()));
                let mut doc = images::images_to_pdf(images, layout)?;
                Output::pdf(&mut doc, "images.pdf")
            }
            Self::PdfToImages(options) => {
                let input = single(inputs)?;
                // Reject encrypted and unparsable input with the same
                // classification as every other PDF operation.
                load(input)?;
                let bytes = render::render_pages(&input.bytes, &input.name, options)?;
                Ok(Output::zip(bytes, "pdf_pages.zip"))
            }
        }
    }
}

fn load(input: &UploadedFile) -> Result<LoadedPdf> {
    PdfReader::load(&input.bytes, &input.name)
}

fn single(inputs: &[UploadedFile]) -> Result<&UploadedFile> {
    inputs
        .first()
        .ok_or_else(|| PdfCraftError::validation("Expected one file"))
}

/// Container format of an [`Output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Zip,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Zip => "zip",
        }
    }

    /// MIME type for HTTP responses.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Zip => "application/zip",
        }
    }
}

/// Bytes produced by an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    /// File name suggested to the client.
    pub download_name: String,
    pub compression: Option<CompressionStats>,
}

impl Output {
    pub fn new(bytes: Vec<u8>, format: OutputFormat, download_name: impl Into<String>) -> Self {
        Self {
            bytes,
            format,
            download_name: download_name.into(),
            compression: None,
        }
    }

    fn pdf(doc: &mut Document, download_name: &str) -> Result<Self> {
        let bytes = PdfWriter::new().write(doc)?;
        Ok(Self::new(bytes, OutputFormat::Pdf, download_name))
    }

    fn zip(bytes: Vec<u8>, download_name: &str) -> Self {
        Self::new(bytes, OutputFormat::Zip, download_name)
    }
}

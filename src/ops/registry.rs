//! Static table of the operations the service accepts.

use serde::Serialize;
use std::collections::HashMap;

use super::images::ImageLayout;
use super::overlay::{PageNumberOptions, WatermarkOptions};
use super::params::{PageSelection, Params, SplitMode};
use super::render::RenderOptions;
use super::security::{ProtectOptions, UnlockOptions};
use super::Operation;
use crate::error::{PdfCraftError, Result};

/// Kind of file an operation consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Pdf,
    /// JPEG or PNG.
    Image,
}

/// Library an operation runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Lopdf,
    /// Loaded at run time; may be missing on the host.
    Pdfium,
}

/// Accepted number of input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileCount {
    pub min: usize,
    /// `None` for no upper bound.
    pub max: Option<usize>,
}

impl FileCount {
    pub const ONE: FileCount = FileCount {
        min: 1,
        max: Some(1),
    };

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn contains(&self, n: usize) -> bool {
        n >= self.min && self.max.is_none_or(|max| n <= max)
    }
}

type Builder = fn(&Params) -> Result<Operation>;

/// One registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub summary: &'static str,
    pub input: InputKind,
    pub files: FileCount,
    pub engine: Engine,
    #[serde(skip)]
    build: Builder,
}

impl OperationSpec {
    /// Check the number of uploaded files.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError describing the accepted count.
    pub fn check_file_count(&self, n: usize) -> Result<()> {
        if self.files.contains(n) {
            return Ok(());
        }
        let expected = match self.files.max {
            Some(max) if max == self.files.min => format!("exactly {max}"),
            Some(max) => format!("between {} and {max}", self.files.min),
            None => format!("at least {}", self.files.min),
        };
        let noun = if self.files.min == 1 && self.files.max == Some(1) {
            "file"
        } else {
            "files"
        };
        Err(PdfCraftError::validation(format!(
            "'{}' requires {expected} {noun}, got {n}",
            self.name
        )))
    }

    /// Parse request parameters into a typed operation.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError for missing or invalid parameters.
    pub fn build(&self, params: &Params) -> Result<Operation> {
        (self.build)(params)
    }
}

/// Lookup table from operation name or alias to its [`OperationSpec`].
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    specs: Vec<OperationSpec>,
    index: HashMap<&'static str, usize>,
}

impl OperationRegistry {
    /// The full set of operations.
    pub fn builtin() -> Self {
        Self::new(vec![
            OperationSpec {
                name: "merge",
                aliases: &[],
                summary: "Combine PDFs into one, in upload order",
                input: InputKind::Pdf,
                files: FileCount::at_least(2),
                engine: Engine::Lopdf,
                build: |_| Ok(Operation::Merge),
            },
            OperationSpec {
                name: "split",
                aliases: &[],
                summary: "Split a PDF into single pages or a page range",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: build_split,
            },
            OperationSpec {
                name: "remove-pages",
                aliases: &["remove"],
                summary: "Delete pages from a PDF",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: |params| Ok(Operation::RemovePages(selection(params)?)),
            },
            OperationSpec {
                name: "extract",
                aliases: &["extract-pages"],
                summary: "Keep only the selected pages, in the order given",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: |params| Ok(Operation::Extract(selection(params)?)),
            },
            OperationSpec {
                name: "compress",
                aliases: &[],
                summary: "Reduce file size losslessly",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: |_| Ok(Operation::Compress),
            },
            OperationSpec {
                name: "rotate",
                aliases: &[],
                summary: "Rotate every page by a multiple of 90 degrees",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: |params| Ok(Operation::Rotate(params.parse_or("angle", Default::default())?)),
            },
            OperationSpec {
                name: "watermark",
                aliases: &[],
                summary: "Stamp diagonal text across every page",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: build_watermark,
            },
            OperationSpec {
                name: "page-numbers",
                aliases: &["paginate"],
                summary: "Number every page",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: build_page_numbers,
            },
            OperationSpec {
                name: "protect",
                aliases: &["encrypt"],
                summary: "Encrypt a PDF with a password",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: build_protect,
            },
            OperationSpec {
                name: "unlock",
                aliases: &["decrypt"],
                summary: "Remove the password from a PDF",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Lopdf,
                build: |params| {
                    Ok(Operation::Unlock(UnlockOptions {
                        password: params.require_raw("password")?.to_string(),
                    }))
                },
            },
            OperationSpec {
                name: "images-to-pdf",
                aliases: &["jpg-to-pdf"],
                summary: "Turn JPEG and PNG images into PDF pages",
                input: InputKind::Image,
                files: FileCount::at_least(1),
                engine: Engine::Lopdf,
                build: build_images_to_pdf,
            },
            OperationSpec {
                name: "pdf-to-jpg",
                aliases: &["pdf-to-image"],
                summary: "Render every page to an image",
                input: InputKind::Pdf,
                files: FileCount::ONE,
                engine: Engine::Pdfium,
                build: build_pdf_to_images,
            },
        ])
    }

    fn new(specs: Vec<OperationSpec>) -> Self {
        let mut index = HashMap::new();
        for (position, spec) in specs.iter().enumerate() {
            index.insert(spec.name, position);
            for alias in spec.aliases {
                index.insert(*alias, position);
            }
        }
        Self { specs, index }
    }

    /// Find an operation by canonical name or alias.
    ///
    /// # Errors
    ///
    /// Returns UnknownOperation if nothing is registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<&OperationSpec> {
        self.index
            .get(name)
            .map(|&position| &self.specs[position])
            .ok_or_else(|| PdfCraftError::unknown_operation(name))
    }

    /// Every operation, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &OperationSpec> {
        self.specs.iter()
    }

    /// Canonical names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|spec| spec.name).collect()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// `range`, or `pages` for clients that use the other spelling.
/// Extract and remove-pages have no default selection: a missing field
/// is an error, not page 1.
fn selection(params: &Params) -> Result<PageSelection> {
    let raw = params
        .get("range")
        .or_else(|| params.get("pages"))
        .ok_or_else(|| PdfCraftError::validation("Missing parameter 'pages'"))?;
    PageSelection::parse(raw)
}

fn build_split(params: &Params) -> Result<Operation> {
    let mode = params.get("mode").unwrap_or("all");
    let mode = match mode.to_ascii_lowercase().as_str() {
        "all" => SplitMode::All,
        "range" => SplitMode::Range(selection(params)?),
        other => {
            return Err(PdfCraftError::validation(format!(
                "'{other}' is not one of: all, range"
            )));
        }
    };
    Ok(Operation::Split(mode))
}

fn build_watermark(params: &Params) -> Result<Operation> {
    let defaults = WatermarkOptions::default();
    let options = WatermarkOptions {
        text: params.get("text").map(str::to_string).unwrap_or(defaults.text),
        opacity: params.parse_or("opacity", defaults.opacity)?,
        angle: params.parse_or("angle", defaults.angle)?,
        font_size: params.parse_or("font_size", defaults.font_size)?,
    };
    options.validate()?;
    Ok(Operation::Watermark(options))
}

fn build_page_numbers(params: &Params) -> Result<Operation> {
    let defaults = PageNumberOptions::default();
    let options = PageNumberOptions {
        start: params.parse_or("start", defaults.start)?,
        position: params.parse_or("position", defaults.position)?,
        format: params.parse_or("format", defaults.format)?,
    };
    Ok(Operation::PageNumbers(options))
}

fn build_protect(params: &Params) -> Result<Operation> {
    let password = params.require_raw("password")?;
    let options = ProtectOptions {
        user_password: password.to_string(),
        owner_password: params.get_raw("owner_password").unwrap_or(password).to_string(),
        cipher: params.parse_or("cipher", Default::default())?,
    };
    Ok(Operation::Protect(options))
}

fn build_images_to_pdf(params: &Params) -> Result<Operation> {
    let margin = match params.get("margin") {
        Some(_) => Some(params.parse_or("margin", 0.0f32)?),
        None => None,
    };
    let layout = ImageLayout {
        page_size: params.parse_or("page_size", Default::default())?,
        orientation: params.parse_or("orientation", Default::default())?,
        margin,
    };
    layout.validate()?;
    Ok(Operation::ImagesToPdf(layout))
}

fn build_pdf_to_images(params: &Params) -> Result<Operation> {
    let defaults = RenderOptions::default();
    let options = RenderOptions {
        dpi: params.parse_or("dpi", defaults.dpi)?,
        format: params.parse_or("format", defaults.format)?,
        quality: params.parse_or("quality", defaults.quality)?,
    };
    options.validate()?;
    Ok(Operation::PdfToImages(options))
}

//! Request parameters and the typed values parsed from them.
//!
//! Clients send every parameter as a multipart text field. [`Params`] holds
//! those raw strings; the types below turn them into values the
//! transformations can trust.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{PdfCraftError, Result};

/// Raw request parameters, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any earlier value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Trimmed value of a parameter. Blank values count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Value of a parameter exactly as sent. Only empty values count as
    /// absent.
    ///
    /// Passwords go through here: surrounding whitespace is part of them.
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Value of a parameter that must be present.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError naming the missing parameter.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| missing(name))
    }

    /// [`get_raw`](Self::get_raw) for a parameter that must be present.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError naming the missing parameter.
    pub fn require_raw(&self, name: &str) -> Result<&str> {
        self.get_raw(name).ok_or_else(|| missing(name))
    }

    /// Parse a parameter, falling back to `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError if the value is present but unparsable.
    pub fn parse_or<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw.parse().map_err(|e| {
                PdfCraftError::validation(format!("Invalid value for '{name}': {e}"))
            }),
            None => Ok(default),
        }
    }

    /// Parameter names, for logging.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

fn missing(name: &str) -> PdfCraftError {
    PdfCraftError::validation(format!("Missing parameter '{name}'"))
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn unknown_choice(value: &str, choices: &[&str]) -> PdfCraftError {
    PdfCraftError::validation(format!(
        "'{value}' is not one of: {}",
        choices.join(", ")
    ))
}

/// A set of 1-based page numbers, e.g. `1-3,5,7-9`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    items: Vec<PageItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageItem {
    Single(u32),
    Range(u32, u32),
}

impl PageSelection {
    /// Parse a selection string.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError if the string is empty, contains a
    /// non-number, a zero page, or a descending range.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfcraft::ops::params::PageSelection;
    ///
    /// let selection = PageSelection::parse("1-3, 5").unwrap();
    /// assert_eq!(selection.resolve(10).unwrap(), vec![1, 2, 3, 5]);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let mut items = Vec::new();

        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            if let Some((start, end)) = part.split_once('-') {
                let start = parse_page_number(start)?;
                let end = parse_page_number(end)?;
                if start > end {
                    return Err(PdfCraftError::validation(format!(
                        "Invalid range {start}-{end}: start page must not exceed end page"
                    )));
                }
                items.push(PageItem::Range(start, end));
            } else {
                items.push(PageItem::Single(parse_page_number(part)?));
            }
        }

        if items.is_empty() {
            return Err(PdfCraftError::validation("Page selection cannot be empty"));
        }

        Ok(Self { items })
    }

    /// Expand to concrete page numbers for a document of `page_count` pages.
    ///
    /// Order follows the selection; repeats keep their first position.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError if any page lies beyond `page_count`.
    pub fn resolve(&self, page_count: u32) -> Result<Vec<u32>> {
        let mut pages = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for item in &self.items {
            let (start, end) = match *item {
                PageItem::Single(page) => (page, page),
                PageItem::Range(start, end) => (start, end),
            };

            if end > page_count {
                return Err(PdfCraftError::validation(format!(
                    "Page {end} is out of range (document has {page_count} pages)"
                )));
            }

            for page in start..=end {
                if seen.insert(page) {
                    pages.push(page);
                }
            }
        }

        Ok(pages)
    }
}

impl FromStr for PageSelection {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_page_number(s: &str) -> Result<u32> {
    let s = s.trim();
    let page: u32 = s
        .parse()
        .map_err(|_| PdfCraftError::validation(format!("Invalid page number: '{s}'")))?;
    if page == 0 {
        return Err(PdfCraftError::validation(
            "Page numbers must be positive (1-indexed)",
        ));
    }
    Ok(page)
}

/// Quarter-turn page rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// No rotation.
    None,
    /// Rotate 90 degrees clockwise.
    #[default]
    Clockwise90,
    /// Rotate 180 degrees.
    Rotate180,
    /// Rotate 270 degrees clockwise.
    Clockwise270,
}

impl Rotation {
    /// Build a rotation from any multiple of 90 degrees, negative included.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError for angles that are not quarter turns.
    pub fn from_degrees(degrees: i64) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(PdfCraftError::validation(format!(
                "Rotation must be a multiple of 90 degrees, got {degrees}"
            )));
        }

        Ok(match degrees.rem_euclid(360) {
            0 => Self::None,
            90 => Self::Clockwise90,
            180 => Self::Rotate180,
            _ => Self::Clockwise270,
        })
    }

    /// Rotation in clockwise degrees, in `0..360`.
    pub fn as_degrees(&self) -> i64 {
        match self {
            Self::None => 0,
            Self::Clockwise90 => 90,
            Self::Rotate180 => 180,
            Self::Clockwise270 => 270,
        }
    }

    /// Add this rotation to an existing `/Rotate` value.
    pub fn apply_to(&self, current: i64) -> i64 {
        (current + self.as_degrees()).rem_euclid(360)
    }
}

impl FromStr for Rotation {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        let degrees: i64 = s
            .trim()
            .parse()
            .map_err(|_| PdfCraftError::validation(format!("Invalid angle: '{s}'")))?;
        Self::from_degrees(degrees)
    }
}

/// How `split` divides a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    /// One PDF per page, delivered as a ZIP archive.
    All,
    /// A single PDF holding the selected pages.
    Range(PageSelection),
}

/// Cipher used by `protect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherStrength {
    /// RC4 with a 128-bit key (PDF 1.4 readers).
    Rc4_128,
    /// AES with a 128-bit key.
    #[default]
    Aes128,
    /// AES with a 256-bit key (PDF 2.0).
    Aes256,
}

impl CipherStrength {
    const CHOICES: &'static [&'static str] = &["aes-128", "aes-256", "rc4-128"];

    /// Parameter spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rc4_128 => "rc4-128",
            Self::Aes128 => "aes-128",
            Self::Aes256 => "aes-256",
        }
    }
}

impl FromStr for CipherStrength {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rc4-128" | "rc4" => Ok(Self::Rc4_128),
            "aes-128" | "aes128" | "aes" => Ok(Self::Aes128),
            "aes-256" | "aes256" => Ok(Self::Aes256),
            _ => Err(unknown_choice(s, Self::CHOICES)),
        }
    }
}

/// Where page numbers are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Centred, near the bottom edge.
    #[default]
    BottomCenter,
    /// Near the bottom-left corner.
    BottomLeft,
    /// Near the bottom-right corner.
    BottomRight,
    /// Centred, near the top edge.
    TopCenter,
    /// Near the top-left corner.
    TopLeft,
    /// Near the top-right corner.
    TopRight,
}

impl Position {
    const CHOICES: &'static [&'static str] = &[
        "bottom-center",
        "bottom-left",
        "bottom-right",
        "top-center",
        "top-left",
        "top-right",
    ];

    /// Whether the label sits along the top edge.
    pub fn is_top(&self) -> bool {
        matches!(self, Self::TopCenter | Self::TopLeft | Self::TopRight)
    }
}

impl FromStr for Position {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "bottom-center" | "bottom-centre" => Ok(Self::BottomCenter),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            "top-center" | "top-centre" => Ok(Self::TopCenter),
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            _ => Err(unknown_choice(s, Self::CHOICES)),
        }
    }
}

/// Text of a page-number label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    /// `"3 / 10"`.
    #[default]
    NOfTotal,
    /// `"3"`.
    Plain,
}

impl NumberFormat {
    /// Render the label for page `n` of a document numbered up to `last`.
    pub fn label(&self, n: u32, last: u32) -> String {
        match self {
            Self::NOfTotal => format!("{n} / {last}"),
            Self::Plain => n.to_string(),
        }
    }
}

impl FromStr for NumberFormat {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "n-of-total" | "n/total" => Ok(Self::NOfTotal),
            "n" => Ok(Self::Plain),
            _ => Err(unknown_choice(s, &["n-of-total", "n"])),
        }
    }
}

/// Page size for `images-to-pdf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    /// Page matches the image at 100 DPI.
    #[default]
    Fit,
    /// ISO A4, 595 x 842 points.
    A4,
    /// US Letter, 612 x 792 points.
    Letter,
}

impl PageSize {
    /// Portrait dimensions in points, or `None` for [`PageSize::Fit`].
    pub fn dimensions(&self) -> Option<(f32, f32)> {
        match self {
            Self::Fit => None,
            Self::A4 => Some((595.0, 842.0)),
            Self::Letter => Some((612.0, 792.0)),
        }
    }
}

impl FromStr for PageSize {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fit" | "auto" => Ok(Self::Fit),
            "a4" => Ok(Self::A4),
            "letter" => Ok(Self::Letter),
            _ => Err(unknown_choice(s, &["fit", "a4", "letter"])),
        }
    }
}

/// Page orientation for fixed page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Follow each image's aspect ratio.
    #[default]
    Auto,
    /// Taller than wide.
    Portrait,
    /// Wider than tall.
    Landscape,
}

impl FromStr for Orientation {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "portrait" => Ok(Self::Portrait),
            "landscape" => Ok(Self::Landscape),
            _ => Err(unknown_choice(s, &["auto", "portrait", "landscape"])),
        }
    }
}

/// Raster format for `pdf-to-jpg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    /// Baseline JPEG.
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl RasterFormat {
    /// File extension for archive entries.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl FromStr for RasterFormat {
    type Err = PdfCraftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            _ => Err(unknown_choice(s, &["jpeg", "png"])),
        }
    }
}

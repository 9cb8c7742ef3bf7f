//! Text stamped over existing pages: watermarks and page numbers.
//!
//! The page's original content is wrapped in `q ... Q` so that any
//! graphics state it leaves behind cannot leak into the stamp. Text is set
//! in one of the standard 14 fonts, which every reader provides, so nothing
//! is embedded.

use lopdf::content::{Content, Operation as Op};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use super::pages;
use super::params::{NumberFormat, Position};
use crate::error::{PdfCraftError, Result};
use crate::io::LoadedPdf;
use crate::utils::resolve;

/// Resource name of the stamp font.
const FONT_RESOURCE: &[u8] = b"PdfCraftFont";

/// Resource name of the stamp transparency state.
const GSTATE_RESOURCE: &[u8] = b"PdfCraftGS";

/// Helvetica glyph widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' ' - '/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0' - '?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@' - 'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P' - '_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`' - 'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p' - '~'
];

/// Helvetica-Bold glyph widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' ' - '/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0' - '?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@' - 'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P' - '_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`' - 'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p' - '~'
];

/// Width used for characters outside the tables.
const FALLBACK_WIDTH: u16 = 556;

/// A standard Type 1 font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    /// Helvetica.
    Helvetica,
    /// Helvetica-Bold.
    HelveticaBold,
}

impl StandardFont {
    fn base_font(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
        }
    }

    fn widths(&self) -> &'static [u16; 95] {
        match self {
            Self::Helvetica => &HELVETICA_WIDTHS,
            Self::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        }
    }

    /// Advance width of `text` at `size` points.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let widths = self.widths();
        let units: u32 = text
            .chars()
            .map(|c| match c as u32 {
                code @ 32..=126 => u32::from(widths[(code - 32) as usize]),
                _ => u32::from(FALLBACK_WIDTH),
            })
            .sum();
        units as f32 * size / 1000.0
    }
}

/// Encode text for a WinAnsi font. Unrepresentable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (32..=126 | 160..=255) => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Diagonal text across the middle of every page.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    /// Text to draw.
    pub text: String,
    /// Fill opacity, 0 to 1.
    pub opacity: f32,
    /// Counter-clockwise angle of the baseline, in degrees.
    pub angle: f32,
    /// Font size in points.
    pub font_size: f32,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: "CONFIDENTIAL".to_string(),
            opacity: 0.3,
            angle: 45.0,
            font_size: 48.0,
        }
    }
}

impl WatermarkOptions {
    /// Check the options are drawable.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError for empty text, opacity outside 0..=1, or
    /// a font size outside 1..=500.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(PdfCraftError::validation("Watermark text cannot be empty"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(PdfCraftError::validation(format!(
                "Opacity must be between 0 and 1, got {}",
                self.opacity
            )));
        }
        if !(1.0..=500.0).contains(&self.font_size) {
            return Err(PdfCraftError::validation(format!(
                "Font size must be between 1 and 500, got {}",
                self.font_size
            )));
        }
        if !self.angle.is_finite() {
            return Err(PdfCraftError::validation("Angle must be a number"));
        }
        Ok(())
    }
}

/// Page-number labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumberOptions {
    /// Number printed on the first page.
    pub start: u32,
    /// Where the label goes.
    pub position: Position,
    /// Label text.
    pub format: NumberFormat,
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            start: 1,
            position: Position::default(),
            format: NumberFormat::default(),
        }
    }
}

const PAGE_NUMBER_SIZE: f32 = 10.0;
const PAGE_NUMBER_GRAY: f32 = 0.4;
const PAGE_NUMBER_SIDE_MARGIN: f32 = 30.0;
const PAGE_NUMBER_BOTTOM_MARGIN: f32 = 20.0;
const PAGE_NUMBER_TOP_MARGIN: f32 = 30.0;

const WATERMARK_GRAY: f32 = 0.6;

/// Fraction of the font size between baseline and the optical centre of
/// capital letters.
const CAP_CENTER: f32 = 0.35;

/// Draw a watermark on every page.
pub fn watermark(pdf: &mut LoadedPdf, options: &WatermarkOptions) -> Result<()> {
    options.validate()?;

    let font = StandardFont::HelveticaBold;
    let text_width = font.text_width(&options.text, options.font_size);
    let (sin, cos) = options.angle.to_radians().sin_cos();
    let half_cap = options.font_size * CAP_CENTER;
    let encoded = win_ansi(&options.text);

    let stamp = StampResources::install(&mut pdf.document, font, Some(options.opacity));

    for_each_page(pdf, |page_box| {
        let (cx, cy) = page_box.center();
        let tx = cx - cos * text_width / 2.0 + sin * half_cap;
        let ty = cy - sin * text_width / 2.0 - cos * half_cap;

        let mut ops = stamp.begin(WATERMARK_GRAY, options.font_size);
        ops.push(Op::new(
            "Tm",
            vec![
                cos.into(),
                sin.into(),
                (-sin).into(),
                cos.into(),
                tx.into(),
                ty.into(),
            ],
        ));
        ops.push(Op::new(
            "Tj",
            vec![Object::String(encoded.clone(), StringFormat::Literal)],
        ));
        ops.push(Op::new("ET", vec![]));
        ops
    }, &stamp)
}

/// Draw a page number on every page.
pub fn number_pages(pdf: &mut LoadedPdf, options: &PageNumberOptions) -> Result<()> {
    let font = StandardFont::Helvetica;
    let page_count = pdf.page_count();
    let last = options.start.saturating_add(page_count.saturating_sub(1));

    let stamp = StampResources::install(&mut pdf.document, font, None);
    let mut number = options.start;

    for_each_page(pdf, |page_box| {
        let label = options.format.label(number, last);
        number = number.saturating_add(1);

        let width = font.text_width(&label, PAGE_NUMBER_SIZE);
        let (x, y) = page_box.label_origin(options.position, width);

        let mut ops = stamp.begin(PAGE_NUMBER_GRAY, PAGE_NUMBER_SIZE);
        ops.push(Op::new("Td", vec![x.into(), y.into()]));
        ops.push(Op::new(
            "Tj",
            vec![Object::String(win_ansi(&label), StringFormat::Literal)],
        ));
        ops.push(Op::new("ET", vec![]));
        ops
    }, &stamp)
}

/// Visible area of a page, in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    /// Lower-left x.
    pub x0: f32,
    /// Lower-left y.
    pub y0: f32,
    /// Upper-right x.
    pub x1: f32,
    /// Upper-right y.
    pub y1: f32,
}

impl PageBox {
    /// US Letter, used when a page has no usable box.
    pub const LETTER: PageBox = PageBox {
        x0: 0.0,
        y0: 0.0,
        x1: 612.0,
        y1: 792.0,
    };

    fn from_array(values: &[Object]) -> Option<Self> {
        let nums: Vec<f32> = values.iter().filter_map(number).collect();
        if nums.len() != 4 {
            return None;
        }
        let page_box = Self {
            x0: nums[0].min(nums[2]),
            y0: nums[1].min(nums[3]),
            x1: nums[0].max(nums[2]),
            y1: nums[1].max(nums[3]),
        };
        (page_box.width() > 0.0 && page_box.height() > 0.0).then_some(page_box)
    }

    /// Crop box if present, else media box.
    pub fn of_page(doc: &Document, page: &Dictionary) -> Self {
        [b"CropBox".as_slice(), b"MediaBox"]
            .iter()
            .filter_map(|key| page.get(key).ok())
            .filter_map(|obj| resolve(doc, obj).as_array().ok())
            .find_map(|values| Self::from_array(values))
            .unwrap_or(Self::LETTER)
    }

    /// Width in points.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height in points.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Centre point.
    pub fn center(&self) -> (f32, f32) {
        (self.x0 + self.width() / 2.0, self.y0 + self.height() / 2.0)
    }

    /// The page as a viewer shows it once `/Rotate` is applied: an upright
    /// box anchored at the origin, and the `cm` matrix taking that box back
    /// into default user space. `None` when the page is not rotated.
    pub fn displayed(&self, rotate: i64) -> (PageBox, Option<[f32; 6]>) {
        let upright = |width: f32, height: f32| PageBox {
            x0: 0.0,
            y0: 0.0,
            x1: width,
            y1: height,
        };
        let (width, height) = (self.width(), self.height());

        match rotate.rem_euclid(360) {
            90 => (upright(height, width), Some([0.0, 1.0, -1.0, 0.0, self.x1, self.y0])),
            180 => (upright(width, height), Some([-1.0, 0.0, 0.0, -1.0, self.x1, self.y1])),
            270 => (upright(height, width), Some([0.0, -1.0, 1.0, 0.0, self.x0, self.y1])),
            _ => (*self, None),
        }
    }

    /// Baseline origin of a label `text_width` points wide.
    pub fn label_origin(&self, position: Position, text_width: f32) -> (f32, f32) {
        let y = if position.is_top() {
            self.y1 - PAGE_NUMBER_TOP_MARGIN
        } else {
            self.y0 + PAGE_NUMBER_BOTTOM_MARGIN
        };

        let x = match position {
            Position::BottomLeft | Position::TopLeft => self.x0 + PAGE_NUMBER_SIDE_MARGIN,
            Position::BottomRight | Position::TopRight => {
                self.x1 - text_width - PAGE_NUMBER_SIDE_MARGIN
            }
            Position::BottomCenter | Position::TopCenter => {
                self.x0 + (self.width() - text_width) / 2.0
            }
        };

        (x, y)
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Font and transparency objects shared by every stamped page.
struct StampResources {
    font_id: ObjectId,
    gstate_id: Option<ObjectId>,
}

impl StampResources {
    fn install(doc: &mut Document, font: StandardFont, opacity: Option<f32>) -> Self {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });

        let gstate_id = opacity.map(|alpha| {
            doc.add_object(dictionary! {
                "Type" => "ExtGState",
                "ca" => alpha,
                "CA" => alpha,
            })
        });

        Self { font_id, gstate_id }
    }

    /// Opening operators: graphics state, fill colour, font.
    fn begin(&self, gray: f32, size: f32) -> Vec<Op> {
        let mut ops = Vec::new();
        if self.gstate_id.is_some() {
            ops.push(Op::new("gs", vec![Object::Name(GSTATE_RESOURCE.to_vec())]));
        }
        ops.push(Op::new("g", vec![gray.into()]));
        ops.push(Op::new("BT", vec![]));
        ops.push(Op::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.to_vec()), size.into()],
        ));
        ops
    }

    /// Register the stamp resources in a page resource dictionary.
    fn register(&self, resources: &mut Dictionary) {
        add_resource(resources, b"Font", FONT_RESOURCE, self.font_id);
        if let Some(gstate_id) = self.gstate_id {
            add_resource(resources, b"ExtGState", GSTATE_RESOURCE, gstate_id);
        }
    }
}

/// Flatten the page tree, then stamp each page with the operators
/// `draw` returns for it.
///
/// `draw` works in the page's displayed frame, so "bottom" is the edge a
/// viewer shows at the bottom whatever the page's `/Rotate`.
fn for_each_page<F>(pdf: &mut LoadedPdf, mut draw: F, stamp: &StampResources) -> Result<()>
where
    F: FnMut(PageBox) -> Vec<Op>,
{
    let page_ids: Vec<ObjectId> = pdf.document.get_pages().into_values().collect();
    pages::set_pages(&mut pdf.document, &page_ids).map_err(|e| pdf.structure_error(e))?;

    for page_id in page_ids {
        // Flattening copied any inherited /Rotate onto the page itself.
        let (page_box, rotate) = pdf
            .document
            .get_dictionary(page_id)
            .map(|page| {
                let rotate = page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
                (PageBox::of_page(&pdf.document, page), rotate)
            })
            .map_err(|e| pdf.structure_error(e))?;
        let (frame, matrix) = page_box.displayed(rotate);

        let mut operations = Vec::new();
        if let Some(matrix) = matrix {
            operations.push(Op::new("cm", matrix.iter().map(|&v| v.into()).collect()));
        }
        operations.extend(draw(frame));
        stamp_page(&mut pdf.document, page_id, stamp, operations)
            .map_err(|e| pdf.structure_error(e))?;
    }

    Ok(())
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    stamp: &StampResources,
    operations: Vec<Op>,
) -> lopdf::Result<()> {
    let (mut resources, existing) = {
        let page = doc.get_dictionary(page_id)?;
        let existing: Vec<Object> = match page.get(b"Contents") {
            Ok(obj @ Object::Reference(_)) => match resolve(doc, obj) {
                Object::Array(items) => items.clone(),
                _ => vec![obj.clone()],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        (page_resources(doc, page), existing)
    };
    stamp.register(&mut resources);

    let mut ops = vec![Op::new("Q", vec![]), Op::new("q", vec![])];
    ops.extend(operations);
    ops.push(Op::new("Q", vec![]));
    let overlay = Content { operations: ops }.encode()?;

    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));

    Ok(())
}

/// The page's resource dictionary, copied inline with its `/Font` and
/// `/ExtGState` sub-dictionaries resolved, ready to be extended.
fn page_resources(doc: &Document, page: &Dictionary) -> Dictionary {
    let mut resources = match page.get(b"Resources").map(|obj| resolve(doc, obj)) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    for key in [b"Font".as_slice(), b"ExtGState"] {
        let resolved = resources
            .get(key)
            .ok()
            .map(|obj| resolve(doc, obj).clone());
        match resolved {
            Some(Object::Dictionary(dict)) => {
                resources.set(key.to_vec(), dict);
            }
            Some(_) => {
                resources.remove(key);
            }
            None => {}
        }
    }

    resources
}

fn add_resource(resources: &mut Dictionary, category: &[u8], name: &[u8], id: ObjectId) {
    if let Ok(Object::Dictionary(entries)) = resources.get_mut(category) {
        entries.set(name.to_vec(), Object::Reference(id));
    } else {
        let mut entries = Dictionary::new();
        entries.set(name.to_vec(), Object::Reference(id));
        resources.set(category.to_vec(), entries);
    }
}

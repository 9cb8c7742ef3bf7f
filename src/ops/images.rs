//! Raster images in and out of PDF.
//!
//! Images become pages through JPEG-compressed image XObjects. Pages become
//! images through pdfium, see [`render`](super::render).

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, Stream, dictionary};
use tracing::debug;

use super::params::{Orientation, PageSize};
use crate::error::{PdfCraftError, Result};

/// Resolution at which a [`PageSize::Fit`] page matches its image.
pub const FIT_DPI: f32 = 100.0;

/// Margin used around images on fixed-size pages, in points.
pub const DEFAULT_MARGIN: f32 = 36.0;

/// JPEG quality for embedded images.
const EMBED_QUALITY: u8 = 90;

/// How images are placed on pages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageLayout {
    /// Page size.
    pub page_size: PageSize,
    /// Orientation for fixed page sizes.
    pub orientation: Orientation,
    /// Margin in points; `None` picks the size's default.
    pub margin: Option<f32>,
}

impl ImageLayout {
    /// Margin in effect.
    pub fn margin(&self) -> f32 {
        self.margin.unwrap_or(match self.page_size {
            PageSize::Fit => 0.0,
            PageSize::A4 | PageSize::Letter => DEFAULT_MARGIN,
        })
    }

    /// Check the layout leaves room for an image.
    ///
    /// # Errors
    ///
    /// Returns a ValidationError for a negative margin or one that consumes
    /// a fixed-size page entirely.
    pub fn validate(&self) -> Result<()> {
        let margin = self.margin();
        if !margin.is_finite() || margin < 0.0 {
            return Err(PdfCraftError::validation(format!(
                "Margin must be a non-negative number, got {margin}"
            )));
        }
        if let Some((w, h)) = self.page_size.dimensions()
            && margin * 2.0 >= w.min(h)
        {
            return Err(PdfCraftError::validation(format!(
                "Margin {margin} leaves no room on the page"
            )));
        }
        Ok(())
    }

    /// Page size in points for an image of `width` x `height` pixels.
    pub fn page_dimensions(&self, width: u32, height: u32) -> (f32, f32) {
        let margin = self.margin();
        match self.page_size.dimensions() {
            None => (
                width as f32 * 72.0 / FIT_DPI + 2.0 * margin,
                height as f32 * 72.0 / FIT_DPI + 2.0 * margin,
            ),
            Some((short, long)) => {
                let landscape = match self.orientation {
                    Orientation::Portrait => false,
                    Orientation::Landscape => true,
                    Orientation::Auto => width > height,
                };
                if landscape { (long, short) } else { (short, long) }
            }
        }
    }

    /// Rectangle `(x, y, width, height)` the image occupies on its page.
    pub fn placement(&self, width: u32, height: u32) -> (f32, f32, f32, f32) {
        let (page_w, page_h) = self.page_dimensions(width, height);
        let margin = self.margin();
        let avail_w = page_w - 2.0 * margin;
        let avail_h = page_h - 2.0 * margin;

        let scale = (avail_w / width as f32).min(avail_h / height as f32);
        let draw_w = width as f32 * scale;
        let draw_h = height as f32 * scale;

        (
            (page_w - draw_w) / 2.0,
            (page_h - draw_h) / 2.0,
            draw_w,
            draw_h,
        )
    }
}

/// Identify an accepted image format from its leading bytes.
pub fn sniff(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => Some(format),
        _ => None,
    }
}

/// Decode an uploaded image.
///
/// # Errors
///
/// Returns MalformedInput if the bytes are not a decodable PNG or JPEG.
pub fn decode(bytes: &[u8], name: &str) -> Result<DynamicImage> {
    let format =
        sniff(bytes).ok_or_else(|| PdfCraftError::malformed(name, "not a PNG or JPEG image"))?;
    image::load_from_memory_with_format(bytes, format).map_err(|e| PdfCraftError::malformed(name, e))
}

/// Flatten any transparency onto white.
fn to_opaque_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| {
            let c = u16::from(c);
            let a = u16::from(a);
            ((c * a + 255 * (255 - a)) / 255) as u8
        };
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encode an RGB image as baseline JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| PdfCraftError::internal("encoding JPEG", e))?;
    Ok(bytes)
}

/// Build a PDF with one page per image, in order.
///
/// # Errors
///
/// Returns a ValidationError for an empty input or invalid layout and
/// MalformedInput for an undecodable image.
pub fn images_to_pdf<'a, I>(images: I, layout: &ImageLayout) -> Result<Document>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    layout.validate()?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for (name, bytes) in images {
        let decoded = decode(bytes, name)?;
        let rgb = to_opaque_rgb(&decoded);
        let (width, height) = rgb.dimensions();
        let jpeg = encode_jpeg(&rgb, EMBED_QUALITY)?;
        debug!(name, width, height, jpeg_size = jpeg.len(), "Embedding image");

        let image_id = doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(width),
                    "Height" => i64::from(height),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            )
            .with_compression(false),
        );

        let (page_w, page_h) = layout.page_dimensions(width, height);
        let (x, y, draw_w, draw_h) = layout.placement(width, height);
        let content = format!("q\n{draw_w:.3} 0 0 {draw_h:.3} {x:.3} {y:.3} cm\n/Im0 Do\nQ\n");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    if kids.is_empty() {
        return Err(PdfCraftError::validation("At least one image is required"));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}
